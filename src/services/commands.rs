//! Slash commands editing the option list, and the removal select menu.

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info};

use crate::{
    discord::{
        events::{GatewayEvent, Interaction, InteractionKind},
        models::{
            CommandDefinition, CommandOptionDefinition, InteractionReply, OPTION_TYPE_STRING,
            SelectMenu,
        },
    },
    dto::commands::MAX_LABEL_CHARS,
    error::ServiceError,
    services::{
        dispatcher::EventHandler,
        option_service::{self, EditOutcome, ResyncStatus},
    },
    state::SharedState,
};

/// Slash command appending an option.
pub const ADD_COMMAND: &str = "add_poll_option";
/// Slash command answering with the removal menu.
pub const REMOVE_COMMAND: &str = "remove_poll_option";
/// Custom id of the select menu sent in reply to [`REMOVE_COMMAND`].
pub const REMOVE_MENU_ID: &str = "remove_poll_option_menu";
const OPTION_TEXT_ARG: &str = "option_text";

/// Commands registered when the gateway session becomes ready.
pub fn command_definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition {
            name: ADD_COMMAND.into(),
            description: "Add an option to the poll".into(),
            options: vec![CommandOptionDefinition {
                kind: OPTION_TYPE_STRING,
                name: OPTION_TEXT_ARG.into(),
                description: "Text of the option".into(),
                required: true,
                max_length: Some(MAX_LABEL_CHARS as u16),
            }],
        },
        CommandDefinition {
            name: REMOVE_COMMAND.into(),
            description: "Remove an option from the poll using a select menu".into(),
            options: Vec::new(),
        },
    ]
}

/// Build the ephemeral reply for `interaction`, `None` when it is not ours.
pub async fn reply_to(state: &SharedState, interaction: &Interaction) -> Option<InteractionReply> {
    let reply = match &interaction.kind {
        InteractionKind::Command { name, options } if name == ADD_COMMAND => {
            let label = options
                .iter()
                .find(|argument| argument.name == OPTION_TEXT_ARG)
                .and_then(|argument| argument.as_str());
            match label {
                Some(label) => match option_service::add_option(state, label).await {
                    Ok(outcome) => edited(&outcome, "added"),
                    Err(err) => error_reply(&err),
                },
                None => InteractionReply::text("Please provide the option text."),
            }
        }
        InteractionKind::Command { name, .. } if name == REMOVE_COMMAND => {
            match option_service::removable_options(state).await {
                Ok(options) => InteractionReply {
                    content: "Select an option to remove:".into(),
                    select: Some(SelectMenu {
                        custom_id: REMOVE_MENU_ID.into(),
                        placeholder: "Choose an option to remove".into(),
                        options,
                    }),
                },
                Err(err) => error_reply(&err),
            }
        }
        InteractionKind::Component { custom_id, values } if custom_id == REMOVE_MENU_ID => {
            match values.first() {
                Some(label) => match option_service::remove_option(state, label).await {
                    Ok(outcome) => edited(&outcome, "removed"),
                    Err(err) => error_reply(&err),
                },
                None => InteractionReply::text("No option selected."),
            }
        }
        other => {
            debug!(interaction = ?other, "ignoring foreign interaction");
            return None;
        }
    };
    Some(reply)
}

/// Interactions answered by [`reply_to`] after an option edit.
fn edits_options(kind: &InteractionKind) -> bool {
    match kind {
        InteractionKind::Command { name, .. } => name == ADD_COMMAND,
        InteractionKind::Component { custom_id, .. } => custom_id == REMOVE_MENU_ID,
    }
}

fn edited(outcome: &EditOutcome, verb: &str) -> InteractionReply {
    let mut content = format!("Option **{}** {verb}.", outcome.label);
    if matches!(outcome.resync, ResyncStatus::Failed(_)) {
        content.push_str(" The current poll could not be refreshed.");
    }
    InteractionReply::text(content)
}

/// User-facing message for a failed command.
fn error_reply(err: &ServiceError) -> InteractionReply {
    let content = match err {
        ServiceError::DuplicateOption(label) => format!("Option **{label}** already exists."),
        ServiceError::UnknownOption(_) => "The selected option does not exist.".into(),
        ServiceError::NoOptionsAvailable => "No option is available to remove.".into(),
        ServiceError::InvalidOption(reason) => format!("Invalid option: {reason}."),
        ServiceError::OptionLimitReached { max } => {
            format!("The poll already holds {max} options; remove one first.")
        }
        _ => "Something went wrong, please try again later.".into(),
    };
    InteractionReply::text(content)
}

/// Dispatcher entry answering command and component interactions.
pub struct CommandHandler {
    state: SharedState,
}

impl CommandHandler {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl EventHandler for CommandHandler {
    fn name(&self) -> &'static str {
        "commands"
    }

    fn handle(&self, event: GatewayEvent) -> BoxFuture<'static, Result<(), ServiceError>> {
        let state = self.state.clone();
        async move {
            let GatewayEvent::Interaction(interaction) = event else {
                return Ok(());
            };
            // Edits wait on the poll gate and a resync, well past the
            // platform's answer deadline.
            let deferred = edits_options(&interaction.kind);
            if deferred {
                state
                    .responder()
                    .defer(interaction.reference.clone())
                    .await
                    .map_err(ServiceError::DeliveryFailed)?;
            }
            let Some(reply) = reply_to(&state, &interaction).await else {
                return Ok(());
            };
            info!(
                interaction_id = interaction.reference.id,
                user_id = ?interaction.user_id,
                deferred,
                "answering interaction"
            );
            let responder = state.responder();
            let sent = if deferred {
                responder.edit_reply(interaction.reference, reply).await
            } else {
                responder.respond(interaction.reference, reply).await
            };
            sent.map_err(ServiceError::DeliveryFailed)
        }
        .boxed()
    }
}
