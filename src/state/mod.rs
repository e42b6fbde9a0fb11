pub mod lifecycle;
pub mod poll;
pub mod scheduler;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    dao::options::OptionRepository,
    discord::{InteractionResponder, models::Snowflake},
};

use self::{
    lifecycle::PollLifecycle,
    scheduler::{DailySchedule, InvalidTransition, SchedulerEvent, SchedulerPhase},
};

pub type SharedState = Arc<AppState>;

/// Central application state shared by the gateway handlers, the scheduler
/// and the HTTP surface.
pub struct AppState {
    options: OptionRepository,
    polls: PollLifecycle,
    responder: Arc<dyn InteractionResponder>,
    guild_id: Option<Snowflake>,
    schedule: RwLock<DailySchedule>,
    degraded: watch::Sender<bool>,
    shutdown: CancellationToken,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a gateway session is ready.
    pub fn new(
        options: OptionRepository,
        polls: PollLifecycle,
        responder: Arc<dyn InteractionResponder>,
        guild_id: Option<Snowflake>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            options,
            polls,
            responder,
            guild_id,
            schedule: RwLock::new(DailySchedule::new()),
            degraded: degraded_tx,
            shutdown: CancellationToken::new(),
        })
    }

    /// Persisted option list.
    pub fn options(&self) -> &OptionRepository {
        &self.options
    }

    /// Owner of the active poll.
    pub fn polls(&self) -> &PollLifecycle {
        &self.polls
    }

    /// Interaction replies and command registration.
    pub fn responder(&self) -> Arc<dyn InteractionResponder> {
        self.responder.clone()
    }

    /// Guild commands are registered on, `None` for global registration.
    pub fn guild_id(&self) -> Option<Snowflake> {
        self.guild_id
    }

    /// Token cancelled once shutdown starts.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Current phase of the daily scheduler.
    pub async fn schedule_phase(&self) -> SchedulerPhase {
        self.schedule.read().await.phase()
    }

    /// Feed an event to the daily scheduler state machine.
    pub async fn apply_schedule_event(
        &self,
        event: SchedulerEvent,
    ) -> Result<SchedulerPhase, InvalidTransition> {
        let mut schedule = self.schedule.write().await;
        schedule.apply(event).inspect_err(|err| {
            warn!(error = %err, "rejected scheduler transition");
        })
    }

    /// Whether the gateway session is currently down.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Record gateway connectivity, broadcasting only actual changes.
    pub fn set_gateway_connected(&self, connected: bool) {
        self.degraded.send_if_modified(|degraded| {
            let changed = *degraded == connected;
            *degraded = !connected;
            changed
        });
    }
}
