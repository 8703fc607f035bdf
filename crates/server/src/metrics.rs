//! Prometheus metrics for the hoist server.
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus
//! scraping; restrict it at the infrastructure level when exposed beyond
//! localhost, or disable it with `server.metrics_enabled = false`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static UPLOADS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("hoist_uploads_created_total", "Total uploads created")
        .expect("metric creation failed")
});

pub static UPLOADS_COMPLETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "hoist_uploads_completed_total",
        "Total uploads that received their full declared length",
    )
    .expect("metric creation failed")
});

pub static UPLOADS_ABORTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "hoist_uploads_aborted_total",
        "Total uploads destroyed after a size violation or inconsistent write",
    )
    .expect("metric creation failed")
});

pub static APPEND_CONFLICTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "hoist_append_conflicts_total",
        "Total appends rejected as conflicting (stale offset or completed upload)",
    )
    .expect("metric creation failed")
});

pub static BYTES_APPENDED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "hoist_bytes_appended_total",
        "Total bytes appended to target files",
    )
    .expect("metric creation failed")
});

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(UPLOADS_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOADS_COMPLETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOADS_ABORTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(APPEND_CONFLICTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_APPENDED.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus text exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    match encoder.encode(&REGISTRY.gather(), &mut buffer) {
        Ok(()) => (StatusCode::OK, buffer).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
