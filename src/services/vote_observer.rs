use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, warn};

use crate::{
    discord::{
        events::{GatewayEvent, VoteEvent},
        models::ThreadRef,
    },
    error::ServiceError,
    services::dispatcher::EventHandler,
    state::{SharedState, lifecycle::ThreadOutcome, poll::OTHER_OPTION},
};

/// What a single vote led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// No poll is tracked.
    NoActivePoll,
    /// The vote targets another message or an unknown answer.
    Unresolved,
    /// A regular answer; only logged.
    Counted { label: String },
    /// First overflow vote on this poll; its thread was opened.
    ThreadOpened(ThreadRef),
    /// The overflow thread of this poll already exists.
    ThreadAlreadyOpen,
    /// Thread creation failed; the next overflow vote retries.
    ThreadFailed,
}

/// Resolve `vote` against the active poll and open the overflow thread on
/// the first vote for the overflow answer.
pub async fn observe_vote(state: &SharedState, vote: &VoteEvent) -> VoteOutcome {
    let polls = state.polls();
    let Some(poll) = polls.snapshot().await else {
        debug!(message_id = vote.message_id, "vote received without active poll");
        return VoteOutcome::NoActivePoll;
    };

    if poll.message != vote.message() {
        debug!(
            poll_id = %poll.id,
            message_id = vote.message_id,
            "vote for a message that is not the active poll"
        );
        return VoteOutcome::Unresolved;
    }
    let Some(answer) = poll.answer(vote.answer_id) else {
        debug!(poll_id = %poll.id, answer_id = vote.answer_id, "vote for unknown answer");
        return VoteOutcome::Unresolved;
    };

    info!(
        poll_id = %poll.id,
        user_id = vote.user_id,
        answer = %answer.label,
        "vote received"
    );
    if answer.label != OTHER_OPTION {
        return VoteOutcome::Counted {
            label: answer.label.clone(),
        };
    }
    if poll.thread_created {
        return VoteOutcome::ThreadAlreadyOpen;
    }

    match polls.open_overflow_thread(poll.id).await {
        Ok(ThreadOutcome::Created(thread)) => VoteOutcome::ThreadOpened(thread),
        Ok(ThreadOutcome::AlreadyCreated) => VoteOutcome::ThreadAlreadyOpen,
        Ok(ThreadOutcome::Superseded) => {
            debug!(poll_id = %poll.id, "poll replaced before its thread was opened");
            VoteOutcome::Unresolved
        }
        Err(err) => {
            warn!(poll_id = %poll.id, error = %err, "could not open overflow thread");
            VoteOutcome::ThreadFailed
        }
    }
}

/// Dispatcher entry for poll vote events.
pub struct VoteObserver {
    state: SharedState,
}

impl VoteObserver {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl EventHandler for VoteObserver {
    fn name(&self) -> &'static str {
        "vote_observer"
    }

    fn handle(&self, event: GatewayEvent) -> BoxFuture<'static, Result<(), ServiceError>> {
        let state = self.state.clone();
        async move {
            if let GatewayEvent::PollVoteAdd(vote) = event {
                observe_vote(&state, &vote).await;
            }
            Ok(())
        }
        .boxed()
    }
}
