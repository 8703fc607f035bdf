//! Route configuration.

use crate::handlers;
use crate::headers::TUS_RESUMABLE;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderValue, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{any, get};
use tower_http::trace::TraceLayer;

/// Every response carries the protocol version and a no-store cache
/// directive, errors included.
async fn protocol_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        TUS_RESUMABLE,
        HeaderValue::from_static(hoist_core::PROTOCOL_VERSION),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Create the application router.
///
/// The upload base path takes every method; the protocol dispatcher does
/// its own method routing so `X-HTTP-Method-Override` can rewrite it.
pub fn create_router(state: AppState) -> Router {
    let base = state.config.upload.base_path.clone();

    let mut router = Router::new()
        // Health check (intentionally unauthenticated for load balancers)
        .route("/healthz", get(handlers::health_check))
        .route(&base, any(handlers::dispatch))
        .route(&format!("{base}/{{id}}"), any(handlers::dispatch));

    // SECURITY: when enabled, network-restrict /metrics to authorized
    // Prometheus scrapers.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .layer(middleware::from_fn(protocol_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
