//! Discord collaborator: the contracts the poll core consumes plus their
//! REST and gateway implementations.

pub mod error;
pub mod events;
pub mod gateway;
pub mod models;
pub mod rest;

use futures::future::BoxFuture;

use self::{
    error::DiscordResult,
    models::{
        CommandDefinition, InteractionRef, InteractionReply, MessageRef, PollDraft, PollMessage,
        Snowflake, ThreadRef,
    },
};

pub use self::{gateway::GatewaySession, rest::DiscordRestClient};

/// Message operations the poll lifecycle depends on.
pub trait Messenger: Send + Sync {
    /// Post a poll in `channel_id`.
    fn send_poll(
        &self,
        channel_id: Snowflake,
        draft: PollDraft,
    ) -> BoxFuture<'static, DiscordResult<PollMessage>>;
    /// Delete a message. A message that is already gone reports
    /// [`error::DiscordError::NotFound`].
    fn delete_message(&self, message: MessageRef) -> BoxFuture<'static, DiscordResult<()>>;
    /// Fetch a poll message with its current results, `None` when it no longer exists.
    fn fetch_message(
        &self,
        message: MessageRef,
    ) -> BoxFuture<'static, DiscordResult<Option<PollMessage>>>;
    /// Open a public thread attached to `message`.
    fn create_thread(
        &self,
        message: MessageRef,
        name: String,
        auto_archive_minutes: u16,
    ) -> BoxFuture<'static, DiscordResult<ThreadRef>>;
}

/// Interaction plumbing used by the command surface.
pub trait InteractionResponder: Send + Sync {
    /// Send an ephemeral reply to an interaction.
    fn respond(
        &self,
        interaction: InteractionRef,
        reply: InteractionReply,
    ) -> BoxFuture<'static, DiscordResult<()>>;
    /// Acknowledge an interaction with an ephemeral "thinking" state; the
    /// answer follows through [`InteractionResponder::edit_reply`].
    fn defer(&self, interaction: InteractionRef) -> BoxFuture<'static, DiscordResult<()>>;
    /// Replace the deferred response of an interaction.
    fn edit_reply(
        &self,
        interaction: InteractionRef,
        reply: InteractionReply,
    ) -> BoxFuture<'static, DiscordResult<()>>;
    /// Overwrite the application's slash commands, guild-scoped when `guild_id` is set.
    fn register_commands(
        &self,
        application_id: Snowflake,
        guild_id: Option<Snowflake>,
        commands: Vec<CommandDefinition>,
    ) -> BoxFuture<'static, DiscordResult<()>>;
}
