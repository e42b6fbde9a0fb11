use futures::future::{BoxFuture, FutureExt};
use tracing::{info, warn};

use crate::{
    discord::events::{GatewayEvent, ReadyEvent},
    error::ServiceError,
    services::{commands::command_definitions, dispatcher::EventHandler},
    state::SharedState,
};

/// Work done each time a gateway session becomes ready: register the slash
/// commands and post the first poll if none is tracked yet.
pub async fn on_ready(state: &SharedState, ready: &ReadyEvent) -> Result<(), ServiceError> {
    state.set_gateway_connected(true);
    info!(
        application_id = ready.application_id,
        bot_user_id = ready.bot_user_id,
        "gateway session ready"
    );

    if let Err(err) = state
        .responder()
        .register_commands(ready.application_id, state.guild_id(), command_definitions())
        .await
    {
        warn!(error = %err, "failed to register slash commands");
    }

    if state.polls().channel_id().is_none() {
        warn!("poll channel not configured; skipping initial poll");
        return Ok(());
    }
    let options = state.options().load().await?;
    state.polls().ensure_active(&options).await?;
    Ok(())
}

/// Dispatcher entry for READY events.
pub struct ReadyHandler {
    state: SharedState,
}

impl ReadyHandler {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl EventHandler for ReadyHandler {
    fn name(&self) -> &'static str {
        "ready"
    }

    fn handle(&self, event: GatewayEvent) -> BoxFuture<'static, Result<(), ServiceError>> {
        let state = self.state.clone();
        async move {
            match event {
                GatewayEvent::Ready(ready) => on_ready(&state, &ready).await,
                _ => Ok(()),
            }
        }
        .boxed()
    }
}
