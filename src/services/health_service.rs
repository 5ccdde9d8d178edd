use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the store answers; live sessions keep running either way.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let live_sessions = state.session_handles().len();
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(live_sessions),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded(live_sessions)
        }
    }
}
