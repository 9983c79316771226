//! GET /health

use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::types::HealthResponse;

/// Health check. Never triggers a parameter fetch.
pub async fn health(State(state): State<Arc<crate::AppState>>) -> Json<HealthResponse> {
    let idp_status = if state.idp.is_loaded().await {
        "ready"
    } else {
        "pending"
    };
    Json(HealthResponse {
        status: "ok".into(),
        idp: idp_status.into(),
    })
}
