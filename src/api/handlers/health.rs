//! Handlers for liveness and readiness probes.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, LivenessResponse, ReadinessChecks, ReadinessResponse};
use crate::state::AppState;

/// Reports that the process is up.
///
/// # Endpoint
///
/// `GET /healthz`
///
/// Always answers 200 while the server accepts connections.
pub async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Returns readiness with component checks.
///
/// # Endpoint
///
/// `GET /readyz`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Components Checked
///
/// 1. **Storage**: Counts links through the repository
/// 2. **Click Queue**: Checks if channel is open and reports free capacity
///
/// # Response
///
/// ```json
/// {
///   "status": "ready",
///   "version": "0.1.0",
///   "checks": {
///     "storage": { "status": "ok", "message": "Connected, 42 links" },
///     "click_queue": { "status": "ok", "message": "Capacity: 10000" }
///   }
/// }
/// ```
pub async fn readiness_handler(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let storage = check_storage(&state).await;
    let click_queue = check_click_queue(&state);

    let ready = storage.is_ok() && click_queue.is_ok();

    let response = ReadinessResponse {
        status: if ready { "ready" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: ReadinessChecks {
            storage,
            click_queue,
        },
    };

    if ready {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_storage(state: &AppState) -> CheckStatus {
    match state.link_service.count().await {
        Ok(count) => CheckStatus::ok(format!("Connected, {count} links")),
        Err(e) => CheckStatus::error(format!("Storage error: {e}")),
    }
}

/// Checks if the click tracking queue is operational.
fn check_click_queue(state: &AppState) -> CheckStatus {
    if state.click_sender.is_closed() {
        CheckStatus::error("Click queue is closed")
    } else {
        CheckStatus::ok(format!("Capacity: {}", state.click_sender.capacity()))
    }
}
