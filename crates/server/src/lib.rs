//! hoist server library.
//!
//! The tus 1.0.0 protocol surface: method dispatch, the upload resource
//! lifecycle (create, append, complete), and the optional download
//! facility, wired over the metadata and storage crates.

pub mod error;
pub mod events;
pub mod handlers;
pub mod headers;
pub mod location;
pub mod lock;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod target;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
