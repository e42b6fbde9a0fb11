use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    poll::{ActivePoll, PollAnswer, PollId},
    scheduler::SchedulerPhase,
};

/// One answer of the active poll as known when it was posted.
#[derive(Debug, Serialize, ToSchema)]
pub struct PollAnswerSummary {
    pub answer_id: u32,
    pub label: String,
    /// Sentinel answers are appended to every poll and never stored.
    pub sentinel: bool,
}

impl From<&PollAnswer> for PollAnswerSummary {
    fn from(answer: &PollAnswer) -> Self {
        Self {
            answer_id: answer.answer_id,
            label: answer.label.clone(),
            sentinel: answer.is_sentinel(),
        }
    }
}

/// Snapshot of the active poll served by `GET /poll`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PollStatusResponse {
    #[schema(value_type = String, format = Uuid)]
    pub id: PollId,
    /// Platform message id, as a string like every snowflake.
    pub message_id: String,
    pub channel_id: String,
    pub question: String,
    pub allow_multiselect: bool,
    pub duration_hours: u32,
    pub thread_created: bool,
    pub created_at: DateTime<Utc>,
    pub answers: Vec<PollAnswerSummary>,
    /// Next daily recreation, when the scheduler is waiting for one.
    pub next_poll_at: Option<DateTime<Local>>,
}

impl PollStatusResponse {
    /// Build the response from a poll snapshot and the scheduler phase.
    pub fn new(poll: &ActivePoll, phase: SchedulerPhase) -> Self {
        let next_poll_at = match phase {
            SchedulerPhase::Waiting { next_fire } => Some(next_fire),
            _ => None,
        };
        Self {
            id: poll.id,
            message_id: poll.message.message_id.to_string(),
            channel_id: poll.message.channel_id.to_string(),
            question: poll.question.clone(),
            allow_multiselect: poll.allow_multiselect,
            duration_hours: poll.duration_hours,
            thread_created: poll.thread_created,
            created_at: poll.created_at,
            answers: poll.answers.iter().map(PollAnswerSummary::from).collect(),
            next_poll_at,
        }
    }
}

/// Stored option labels served by `GET /options`.
#[derive(Debug, Serialize, ToSchema)]
pub struct OptionsResponse {
    pub options: Vec<String>,
    /// Labels that can still be added before the poll is full.
    pub remaining: usize,
}
