use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiResponse, AppState};
use crate::api::types::StatusResponse;

/// GET /api/system/status
/// Liveness probe: reports version, uptime, and database reachability.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatusResponse>> {
    let database = match state.shared.store.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::error!("Database ping failed: {e}");
            "unreachable".to_string()
        }
    };

    Json(ApiResponse::success(StatusResponse {
        status: "running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        database,
    }))
}
