use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::discord::models::{MessageRef, PollMessage};

/// Overflow answer; the first vote on it opens the discussion thread.
pub const OTHER_OPTION: &str = "Other";
/// Opt-out answer.
pub const NOT_PLAYING_OPTION: &str = "Not playing";
/// Answers appended to every poll, in display order.
pub const SENTINEL_OPTIONS: [&str; 2] = [OTHER_OPTION, NOT_PLAYING_OPTION];

/// Local identifier of one poll lifetime.
pub type PollId = Uuid;

/// Whether `label` is one of the synthesized answers.
pub fn is_sentinel(label: &str) -> bool {
    SENTINEL_OPTIONS.contains(&label)
}

/// User options followed by the sentinel answers.
pub fn build_answers(options: &[String]) -> Vec<String> {
    options
        .iter()
        .cloned()
        .chain(SENTINEL_OPTIONS.iter().map(|label| (*label).to_owned()))
        .collect()
}

/// One answer of the live poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollAnswer {
    pub answer_id: u32,
    pub label: String,
    pub vote_count: u32,
}

impl PollAnswer {
    /// Whether this answer is a sentinel.
    pub fn is_sentinel(&self) -> bool {
        is_sentinel(&self.label)
    }
}

/// Answers of `message` joined with its current result counts.
pub fn tally(message: &PollMessage) -> Vec<PollAnswer> {
    message
        .answers
        .iter()
        .map(|answer| PollAnswer {
            answer_id: answer.answer_id,
            label: answer.label.clone(),
            vote_count: message.count_for(answer.answer_id),
        })
        .collect()
}

/// Votes cast on non-sentinel answers. Sentinel votes never block a resync.
pub fn real_votes(answers: &[PollAnswer]) -> u32 {
    answers
        .iter()
        .filter(|answer| !answer.is_sentinel())
        .map(|answer| answer.vote_count)
        .sum()
}

/// The single live poll tracked by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePoll {
    pub id: PollId,
    pub message: MessageRef,
    pub question: String,
    pub allow_multiselect: bool,
    pub answers: Vec<PollAnswer>,
    pub created_at: DateTime<Utc>,
    pub duration_hours: u32,
    /// Set once the overflow thread exists; a fresh poll always starts unset.
    pub thread_created: bool,
}

impl ActivePoll {
    /// Track a freshly posted poll message.
    pub fn posted(
        message: &PollMessage,
        question: &str,
        duration_hours: u32,
        allow_multiselect: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.message,
            question: question.to_owned(),
            allow_multiselect,
            answers: tally(message),
            created_at: Utc::now(),
            duration_hours,
            thread_created: false,
        }
    }

    /// Resolve a platform answer id.
    pub fn answer(&self, answer_id: u32) -> Option<&PollAnswer> {
        self.answers
            .iter()
            .find(|answer| answer.answer_id == answer_id)
    }

    /// Answer labels in display order.
    pub fn labels(&self) -> Vec<&str> {
        self.answers
            .iter()
            .map(|answer| answer.label.as_str())
            .collect()
    }

    /// Copy of this poll with the overflow thread recorded.
    pub(crate) fn with_thread(&self) -> Self {
        Self {
            thread_created: true,
            ..self.clone()
        }
    }
}
