//! Discord payloads and the platform-neutral views the rest of the crate consumes.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

/// Discord identifiers are 64-bit snowflakes, serialized as strings on the wire.
pub type Snowflake = u64;

/// Address of a message inside a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
}

/// Everything needed to post a poll message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollDraft {
    /// Message body shown above the poll.
    pub content: String,
    pub question: String,
    pub duration_hours: u32,
    pub allow_multiselect: bool,
    /// Answer labels in display order.
    pub answers: Vec<String>,
}

/// Poll message as currently known to the platform, including its result snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollMessage {
    pub message: MessageRef,
    pub question: String,
    pub answers: Vec<PollAnswerRef>,
    /// Aggregate counts; answers without votes may be absent.
    pub answer_counts: Vec<AnswerCount>,
}

impl PollMessage {
    /// Vote count recorded for `answer_id`, zero when absent from the results.
    pub fn count_for(&self, answer_id: u32) -> u32 {
        self.answer_counts
            .iter()
            .find(|count| count.answer_id == answer_id)
            .map(|count| count.count)
            .unwrap_or(0)
    }
}

/// Answer identifier assigned by the platform together with its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollAnswerRef {
    pub answer_id: u32,
    pub label: String,
}

/// Aggregate votes for one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerCount {
    pub answer_id: u32,
    pub count: u32,
}

/// Handle on a freshly created thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef {
    pub id: Snowflake,
    pub name: String,
}

/// Interaction addressing data needed to answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionRef {
    pub id: Snowflake,
    /// Application the interaction was sent to; addresses deferred edits.
    pub application_id: Snowflake,
    pub token: String,
}

/// Ephemeral reply to an interaction, optionally carrying a single select menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionReply {
    pub content: String,
    pub select: Option<SelectMenu>,
}

impl InteractionReply {
    /// Plain text reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            select: None,
        }
    }
}

/// String select menu whose option values equal their labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectMenu {
    pub custom_id: String,
    pub placeholder: String,
    pub options: Vec<String>,
}

/// Slash command definition registered with the platform.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOptionDefinition>,
}

/// Argument accepted by a slash command.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandOptionDefinition {
    /// Discord option type (3 = string).
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u16>,
}

pub(crate) const OPTION_TYPE_STRING: u8 = 3;

// --- wire payloads -----------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct CreateMessageBody<'a> {
    pub content: &'a str,
    pub poll: CreatePollBody<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatePollBody<'a> {
    pub question: PollMediaBody<'a>,
    pub answers: Vec<PollAnswerBody<'a>>,
    pub duration: u32,
    pub allow_multiselect: bool,
    /// Only the default layout exists.
    pub layout_type: u8,
}

#[derive(Debug, Serialize)]
pub(crate) struct PollMediaBody<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct PollAnswerBody<'a> {
    pub poll_media: PollMediaBody<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StartThreadBody<'a> {
    pub name: &'a str,
    pub auto_archive_duration: u16,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(crate) struct MessagePayload {
    #[serde_as(as = "DisplayFromStr")]
    pub id: Snowflake,
    #[serde_as(as = "DisplayFromStr")]
    pub channel_id: Snowflake,
    #[serde(default)]
    pub poll: Option<PollPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PollPayload {
    pub question: PollMediaPayload,
    #[serde(default)]
    pub answers: Vec<PollAnswerPayload>,
    #[serde(default)]
    pub results: Option<PollResultsPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PollMediaPayload {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PollAnswerPayload {
    pub answer_id: u32,
    pub poll_media: PollMediaPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PollResultsPayload {
    #[serde(default)]
    pub answer_counts: Vec<AnswerCountPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerCountPayload {
    pub id: u32,
    pub count: u32,
}

impl MessagePayload {
    /// Convert into a [`PollMessage`], returning `None` when no poll is attached.
    pub fn into_poll_message(self) -> Option<PollMessage> {
        let poll = self.poll?;
        Some(PollMessage {
            message: MessageRef {
                channel_id: self.channel_id,
                message_id: self.id,
            },
            question: poll.question.text.unwrap_or_default(),
            answers: poll
                .answers
                .into_iter()
                .map(|answer| PollAnswerRef {
                    answer_id: answer.answer_id,
                    label: answer.poll_media.text.unwrap_or_default(),
                })
                .collect(),
            answer_counts: poll
                .results
                .map(|results| {
                    results
                        .answer_counts
                        .into_iter()
                        .map(|count| AnswerCount {
                            answer_id: count.id,
                            count: count.count,
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(crate) struct ThreadPayload {
    #[serde_as(as = "DisplayFromStr")]
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_poll_message_with_results() {
        let raw = r#"{
            "id": "1300000000000000001",
            "channel_id": "1200000000000000002",
            "content": "**Poll of the day:**",
            "poll": {
                "question": {"text": "What do you want to play tonight?"},
                "answers": [
                    {"answer_id": 1, "poll_media": {"text": "Chess"}},
                    {"answer_id": 2, "poll_media": {"text": "Other"}}
                ],
                "allow_multiselect": true,
                "results": {
                    "is_finalized": false,
                    "answer_counts": [{"id": 2, "count": 3, "me_voted": false}]
                }
            }
        }"#;

        let payload: MessagePayload = serde_json::from_str(raw).unwrap();
        let message = payload.into_poll_message().unwrap();

        assert_eq!(message.message.message_id, 1_300_000_000_000_000_001);
        assert_eq!(message.message.channel_id, 1_200_000_000_000_000_002);
        assert_eq!(message.answers.len(), 2);
        assert_eq!(message.count_for(1), 0);
        assert_eq!(message.count_for(2), 3);
    }

    #[test]
    fn message_without_poll_has_no_view() {
        let raw = r#"{"id": "1", "channel_id": "2", "content": "hello"}"#;
        let payload: MessagePayload = serde_json::from_str(raw).unwrap();
        assert!(payload.into_poll_message().is_none());
    }

    #[test]
    fn command_definition_omits_empty_options() {
        let definition = CommandDefinition {
            name: "remove_poll_option".into(),
            description: "Remove an option".into(),
            options: vec![],
        };
        let json = serde_json::to_value(&definition).unwrap();
        assert!(json.get("options").is_none());
    }
}
