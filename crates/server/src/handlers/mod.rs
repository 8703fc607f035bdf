//! HTTP request handlers.

pub mod common;
pub mod uploads;

pub use common::*;
pub use uploads::*;
