//! Operational handlers.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

/// GET /healthz - liveness probe. Pings the metadata store so a broken
/// backend shows up before clients do.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.metadata.health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}
