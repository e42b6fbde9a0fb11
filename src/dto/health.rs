use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" while the gateway session is up, "degraded" otherwise.
    pub status: String,
    pub gateway_connected: bool,
    /// Whether a poll is currently tracked.
    pub active_poll: bool,
}

impl HealthResponse {
    /// Build the payload from the gateway flag and poll presence.
    pub fn new(gateway_connected: bool, active_poll: bool) -> Self {
        let status = if gateway_connected { "ok" } else { "degraded" };
        Self {
            status: status.to_string(),
            gateway_connected,
            active_poll,
        }
    }
}
