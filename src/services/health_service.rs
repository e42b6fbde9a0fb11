use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report gateway connectivity and whether a poll is tracked.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let connected = !state.is_degraded();
    if !connected {
        warn!("gateway session down (degraded mode)");
    }
    let active_poll = state.polls().snapshot().await.is_some();
    HealthResponse::new(connected, active_poll)
}
