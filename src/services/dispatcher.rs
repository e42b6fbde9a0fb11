//! Routing of gateway events to the handlers registered for them.

use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    discord::events::{EventKind, GatewayEvent},
    error::ServiceError,
    services::{commands::CommandHandler, startup::ReadyHandler, vote_observer::VoteObserver},
    state::SharedState,
};

/// Reaction to one kind of gateway event.
pub trait EventHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;
    /// Handle one event. Errors are logged by the dispatcher.
    fn handle(&self, event: GatewayEvent) -> BoxFuture<'static, Result<(), ServiceError>>;
}

/// Table of handlers keyed by event kind.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    pub fn subscribe(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> &mut Self {
        self.handlers.entry(kind).or_default().push(handler);
        self
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Run every handler for `event` on its own task.
    pub fn dispatch(&self, event: GatewayEvent) -> Vec<JoinHandle<()>> {
        let Some(handlers) = self.handlers.get(&event.kind()) else {
            debug!(kind = ?event.kind(), "no handler registered");
            return Vec::new();
        };

        handlers
            .iter()
            .map(|handler| {
                let name = handler.name();
                let work = handler.handle(event.clone());
                tokio::spawn(async move {
                    if let Err(err) = work.await {
                        warn!(handler = name, error = %err, "event handler failed");
                    }
                })
            })
            .collect()
    }

    /// Dispatch events from `events` until the channel closes or `cancel` fires.
    pub async fn pump(
        self: Arc<Self>,
        mut events: mpsc::Receiver<GatewayEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.dispatch(event);
                    }
                    None => break,
                },
            }
        }
        debug!("event pump stopped");
    }
}

/// Dispatcher wired with the ready handler, the vote observer and the command handler.
pub fn default_dispatcher(state: &SharedState) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher
        .subscribe(EventKind::Ready, Arc::new(ReadyHandler::new(state.clone())))
        .subscribe(
            EventKind::PollVoteAdd,
            Arc::new(VoteObserver::new(state.clone())),
        )
        .subscribe(
            EventKind::Interaction,
            Arc::new(CommandHandler::new(state.clone())),
        );
    dispatcher
}
