//! Typed gateway events routed through the dispatcher.

use serde::Deserialize;
use serde_json::Value;
use serde_with::{DisplayFromStr, serde_as};

use super::models::{InteractionRef, MessageRef, Snowflake};

/// Coarse event category used as the dispatch table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    PollVoteAdd,
    Interaction,
}

/// Gateway dispatch payloads this bot reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// Session established.
    Ready(ReadyEvent),
    /// A single user vote on a poll answer.
    PollVoteAdd(VoteEvent),
    /// Slash command or component interaction.
    Interaction(Interaction),
}

impl GatewayEvent {
    /// Dispatch key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            GatewayEvent::Ready(_) => EventKind::Ready,
            GatewayEvent::PollVoteAdd(_) => EventKind::PollVoteAdd,
            GatewayEvent::Interaction(_) => EventKind::Interaction,
        }
    }
}

/// Data carried by the READY dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyEvent {
    pub application_id: Snowflake,
    pub bot_user_id: Snowflake,
}

/// One vote added on a poll answer.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VoteEvent {
    #[serde_as(as = "DisplayFromStr")]
    pub user_id: Snowflake,
    #[serde_as(as = "DisplayFromStr")]
    pub channel_id: Snowflake,
    #[serde_as(as = "DisplayFromStr")]
    pub message_id: Snowflake,
    pub answer_id: u32,
}

impl VoteEvent {
    /// Message the vote was cast on.
    pub fn message(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id,
            message_id: self.message_id,
        }
    }
}

/// Interaction the command handler understands.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub reference: InteractionRef,
    pub user_id: Option<Snowflake>,
    pub kind: InteractionKind,
}

/// Payload variants of an [`Interaction`].
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionKind {
    /// Slash command invocation with its named arguments.
    Command {
        name: String,
        options: Vec<CommandArgument>,
    },
    /// Message component (select menu) submission.
    Component {
        custom_id: String,
        values: Vec<String>,
    },
}

/// Named slash command argument.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandArgument {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl CommandArgument {
    /// Argument value when it is a string.
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

const INTERACTION_APPLICATION_COMMAND: u8 = 2;
const INTERACTION_MESSAGE_COMPONENT: u8 = 3;

#[derive(Debug, Deserialize)]
struct ReadyPayload {
    user: IdPayload,
    application: IdPayload,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct IdPayload {
    #[serde_as(as = "DisplayFromStr")]
    id: Snowflake,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct InteractionPayload {
    #[serde_as(as = "DisplayFromStr")]
    id: Snowflake,
    #[serde_as(as = "DisplayFromStr")]
    application_id: Snowflake,
    #[serde(rename = "type")]
    kind: u8,
    token: String,
    #[serde(default)]
    data: Option<InteractionDataPayload>,
    #[serde(default)]
    member: Option<MemberPayload>,
    #[serde(default)]
    user: Option<IdPayload>,
}

#[derive(Debug, Deserialize)]
struct MemberPayload {
    user: IdPayload,
}

#[derive(Debug, Default, Deserialize)]
struct InteractionDataPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    options: Vec<CommandArgument>,
    #[serde(default)]
    custom_id: Option<String>,
    #[serde(default)]
    values: Vec<String>,
}

/// Decode a dispatch (`op` 0) payload. Unhandled event names yield `Ok(None)`.
pub fn decode_dispatch(name: &str, data: Value) -> Result<Option<GatewayEvent>, serde_json::Error> {
    let event = match name {
        "READY" => {
            let ready: ReadyPayload = serde_json::from_value(data)?;
            Some(GatewayEvent::Ready(ReadyEvent {
                application_id: ready.application.id,
                bot_user_id: ready.user.id,
            }))
        }
        "MESSAGE_POLL_VOTE_ADD" => Some(GatewayEvent::PollVoteAdd(serde_json::from_value(data)?)),
        "INTERACTION_CREATE" => {
            let payload: InteractionPayload = serde_json::from_value(data)?;
            decode_interaction(payload).map(GatewayEvent::Interaction)
        }
        _ => None,
    };
    Ok(event)
}

fn decode_interaction(payload: InteractionPayload) -> Option<Interaction> {
    let data = payload.data.unwrap_or_default();
    let kind = match payload.kind {
        INTERACTION_APPLICATION_COMMAND => InteractionKind::Command {
            name: data.name?,
            options: data.options,
        },
        INTERACTION_MESSAGE_COMPONENT => InteractionKind::Component {
            custom_id: data.custom_id?,
            values: data.values,
        },
        _ => return None,
    };

    let user_id = payload
        .member
        .map(|member| member.user.id)
        .or(payload.user.map(|user| user.id));

    Some(Interaction {
        reference: InteractionRef {
            id: payload.id,
            application_id: payload.application_id,
            token: payload.token,
        },
        user_id,
        kind,
    })
}
