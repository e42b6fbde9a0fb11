use chrono::{DateTime, Local};
use thiserror::Error;

/// Phases of the daily recreation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Not started yet, or between a settled run and the next computation.
    Idle,
    /// Sleeping until the next daily target.
    Waiting {
        /// Local wall-clock time of the next recreation.
        next_fire: DateTime<Local>,
    },
    /// Recreating today's poll.
    Firing,
    /// The loop was cancelled and will not fire again.
    Stopped,
}

/// Events driving [`DailySchedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// The next target has been computed.
    Scheduled(DateTime<Local>),
    /// The sleep until the target elapsed.
    Woke,
    /// The settle buffer after a recreation elapsed.
    Settled,
    /// Shutdown was requested.
    Stop,
}

/// Error returned when an event does not apply to the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the schedule was in.
    pub from: SchedulerPhase,
    /// Event that cannot be applied from this phase.
    pub event: SchedulerEvent,
}

/// Transition table of the daily scheduler.
#[derive(Debug, Clone)]
pub struct DailySchedule {
    phase: SchedulerPhase,
    fired: u64,
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self {
            phase: SchedulerPhase::Idle,
            fired: 0,
        }
    }
}

impl DailySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    /// Number of recreations started since boot.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Next recreation target, when waiting for one.
    pub fn next_fire(&self) -> Option<DateTime<Local>> {
        match self.phase {
            SchedulerPhase::Waiting { next_fire } => Some(next_fire),
            _ => None,
        }
    }

    /// Apply `event`, returning the new phase.
    pub fn apply(&mut self, event: SchedulerEvent) -> Result<SchedulerPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SchedulerPhase::Stopped, event) => {
                return Err(InvalidTransition {
                    from: SchedulerPhase::Stopped,
                    event,
                });
            }
            (_, SchedulerEvent::Stop) => SchedulerPhase::Stopped,
            (SchedulerPhase::Idle, SchedulerEvent::Scheduled(next_fire)) => {
                SchedulerPhase::Waiting { next_fire }
            }
            (SchedulerPhase::Waiting { .. }, SchedulerEvent::Woke) => {
                self.fired += 1;
                SchedulerPhase::Firing
            }
            (SchedulerPhase::Firing, SchedulerEvent::Settled) => SchedulerPhase::Idle,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        self.phase = next;
        Ok(next)
    }
}
