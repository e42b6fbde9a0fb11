use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::poll::{OptionsResponse, PollStatusResponse},
    error::AppError,
    services::status_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/poll",
    tag = "poll",
    responses(
        (status = 200, description = "Active poll snapshot", body = PollStatusResponse),
        (status = 404, description = "No poll is currently tracked")
    )
)]
/// Return the poll currently tracked by the bot.
pub async fn current_poll(
    State(state): State<SharedState>,
) -> Result<Json<PollStatusResponse>, AppError> {
    status_service::poll_status(&state)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no active poll".into()))
}

#[utoipa::path(
    get,
    path = "/options",
    tag = "poll",
    responses(
        (status = 200, description = "Stored option labels", body = OptionsResponse),
        (status = 503, description = "Option file unreadable")
    )
)]
/// Return the stored option list.
pub async fn stored_options(
    State(state): State<SharedState>,
) -> Result<Json<OptionsResponse>, AppError> {
    Ok(Json(status_service::options(&state).await?))
}

/// Configure the poll routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/poll", get(current_poll))
        .route("/options", get(stored_options))
}
