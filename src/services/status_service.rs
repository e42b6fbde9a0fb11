use crate::{
    dao::options::MAX_STORED_OPTIONS,
    dto::poll::{OptionsResponse, PollStatusResponse},
    error::ServiceError,
    services::option_service,
    state::SharedState,
};

/// Snapshot of the active poll, `None` when no poll is tracked.
pub async fn poll_status(state: &SharedState) -> Option<PollStatusResponse> {
    let poll = state.polls().snapshot().await?;
    let phase = state.schedule_phase().await;
    Some(PollStatusResponse::new(&poll, phase))
}

/// Stored options with the remaining capacity.
pub async fn options(state: &SharedState) -> Result<OptionsResponse, ServiceError> {
    let options = option_service::list_options(state).await?;
    Ok(OptionsResponse {
        remaining: MAX_STORED_OPTIONS.saturating_sub(options.len()),
        options,
    })
}
