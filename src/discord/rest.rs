use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::{
    InteractionResponder, Messenger,
    error::{DiscordError, DiscordResult},
    models::{
        CommandDefinition, CreateMessageBody, CreatePollBody, InteractionRef, InteractionReply,
        MessagePayload, MessageRef, PollAnswerBody, PollDraft, PollMediaBody, PollMessage,
        SelectMenu, Snowflake, StartThreadBody, ThreadPayload, ThreadRef,
    },
};

/// Public REST endpoint, API version 10.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/soiree-poll, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);
/// Interaction callback type answering with a channel message.
const CALLBACK_CHANNEL_MESSAGE: u8 = 4;
/// Interaction callback type acknowledging now and answering later.
const CALLBACK_DEFERRED_CHANNEL_MESSAGE: u8 = 5;
const FLAG_EPHEMERAL: u64 = 1 << 6;

/// Discord REST client implementing [`Messenger`] and [`InteractionResponder`].
#[derive(Clone)]
pub struct DiscordRestClient {
    client: Client,
    base_url: Arc<str>,
    authorization: Arc<str>,
}

impl DiscordRestClient {
    /// Build a client against the public API.
    pub fn new(bot_token: &str) -> DiscordResult<Self> {
        Self::with_base_url(DEFAULT_API_BASE, bot_token)
    }

    /// Build a client against an arbitrary base URL (used by tests).
    pub fn with_base_url(base_url: &str, bot_token: &str) -> DiscordResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| DiscordError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            authorization: Arc::from(format!("Bot {bot_token}")),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, self.authorization.as_ref())
    }

    async fn execute(&self, builder: RequestBuilder, path: &str) -> DiscordResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|source| DiscordError::RequestSend {
                path: path.to_owned(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DiscordError::NotFound {
                path: path.to_owned(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscordError::RequestStatus {
                path: path.to_owned(),
                status,
                body,
            });
        }

        debug!(path, %status, "discord request succeeded");
        Ok(response)
    }

    async fn execute_json<T>(&self, builder: RequestBuilder, path: &str) -> DiscordResult<T>
    where
        T: DeserializeOwned,
    {
        self.execute(builder, path)
            .await?
            .json::<T>()
            .await
            .map_err(|source| DiscordError::DecodeResponse {
                path: path.to_owned(),
                source,
            })
    }

    async fn post_poll(&self, channel_id: Snowflake, draft: PollDraft) -> DiscordResult<PollMessage> {
        let path = format!("/channels/{channel_id}/messages");
        let body = CreateMessageBody {
            content: &draft.content,
            poll: CreatePollBody {
                question: PollMediaBody {
                    text: &draft.question,
                },
                answers: draft
                    .answers
                    .iter()
                    .map(|label| PollAnswerBody {
                        poll_media: PollMediaBody { text: label },
                    })
                    .collect(),
                duration: draft.duration_hours,
                allow_multiselect: draft.allow_multiselect,
                layout_type: 1,
            },
        };

        let payload: MessagePayload = self
            .execute_json(self.request(Method::POST, &path).json(&body), &path)
            .await?;
        let message_id = payload.id;
        payload
            .into_poll_message()
            .ok_or(DiscordError::MissingPoll { message_id })
    }

    async fn get_poll(&self, message: MessageRef) -> DiscordResult<Option<PollMessage>> {
        let path = message_path(message);
        match self
            .execute_json::<MessagePayload>(self.request(Method::GET, &path), &path)
            .await
        {
            Ok(payload) => {
                let message_id = payload.id;
                payload
                    .into_poll_message()
                    .map(Some)
                    .ok_or(DiscordError::MissingPoll { message_id })
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn remove_message(&self, message: MessageRef) -> DiscordResult<()> {
        let path = message_path(message);
        self.execute(self.request(Method::DELETE, &path), &path)
            .await?;
        Ok(())
    }

    async fn start_thread(
        &self,
        message: MessageRef,
        name: String,
        auto_archive_minutes: u16,
    ) -> DiscordResult<ThreadRef> {
        let path = format!("{}/threads", message_path(message));
        let body = StartThreadBody {
            name: &name,
            auto_archive_duration: auto_archive_minutes,
        };
        let payload: ThreadPayload = self
            .execute_json(self.request(Method::POST, &path).json(&body), &path)
            .await?;
        Ok(ThreadRef {
            id: payload.id,
            name: if payload.name.is_empty() {
                name
            } else {
                payload.name
            },
        })
    }

    async fn post_interaction_reply(
        &self,
        interaction: InteractionRef,
        reply: InteractionReply,
    ) -> DiscordResult<()> {
        let path = format!(
            "/interactions/{}/{}/callback",
            interaction.id, interaction.token
        );
        self.execute(
            self.request(Method::POST, &path)
                .json(&interaction_callback_body(&reply)),
            &path,
        )
        .await?;
        Ok(())
    }

    async fn post_deferral(&self, interaction: InteractionRef) -> DiscordResult<()> {
        let path = format!(
            "/interactions/{}/{}/callback",
            interaction.id, interaction.token
        );
        let body = json!({
            "type": CALLBACK_DEFERRED_CHANNEL_MESSAGE,
            "data": { "flags": FLAG_EPHEMERAL },
        });
        self.execute(self.request(Method::POST, &path).json(&body), &path)
            .await?;
        Ok(())
    }

    async fn patch_original_reply(
        &self,
        interaction: InteractionRef,
        reply: InteractionReply,
    ) -> DiscordResult<()> {
        let path = format!(
            "/webhooks/{}/{}/messages/@original",
            interaction.application_id, interaction.token
        );
        self.execute(
            self.request(Method::PATCH, &path)
                .json(&reply_message_data(&reply)),
            &path,
        )
        .await?;
        Ok(())
    }

    async fn put_commands(
        &self,
        application_id: Snowflake,
        guild_id: Option<Snowflake>,
        commands: Vec<CommandDefinition>,
    ) -> DiscordResult<()> {
        let path = match guild_id {
            Some(guild_id) => format!("/applications/{application_id}/guilds/{guild_id}/commands"),
            None => format!("/applications/{application_id}/commands"),
        };
        self.execute(self.request(Method::PUT, &path).json(&commands), &path)
            .await?;
        Ok(())
    }
}

impl Messenger for DiscordRestClient {
    fn send_poll(
        &self,
        channel_id: Snowflake,
        draft: PollDraft,
    ) -> BoxFuture<'static, DiscordResult<PollMessage>> {
        let client = self.clone();
        Box::pin(async move { client.post_poll(channel_id, draft).await })
    }

    fn delete_message(&self, message: MessageRef) -> BoxFuture<'static, DiscordResult<()>> {
        let client = self.clone();
        Box::pin(async move { client.remove_message(message).await })
    }

    fn fetch_message(
        &self,
        message: MessageRef,
    ) -> BoxFuture<'static, DiscordResult<Option<PollMessage>>> {
        let client = self.clone();
        Box::pin(async move { client.get_poll(message).await })
    }

    fn create_thread(
        &self,
        message: MessageRef,
        name: String,
        auto_archive_minutes: u16,
    ) -> BoxFuture<'static, DiscordResult<ThreadRef>> {
        let client = self.clone();
        Box::pin(async move { client.start_thread(message, name, auto_archive_minutes).await })
    }
}

impl InteractionResponder for DiscordRestClient {
    fn respond(
        &self,
        interaction: InteractionRef,
        reply: InteractionReply,
    ) -> BoxFuture<'static, DiscordResult<()>> {
        let client = self.clone();
        Box::pin(async move { client.post_interaction_reply(interaction, reply).await })
    }

    fn defer(&self, interaction: InteractionRef) -> BoxFuture<'static, DiscordResult<()>> {
        let client = self.clone();
        Box::pin(async move { client.post_deferral(interaction).await })
    }

    fn edit_reply(
        &self,
        interaction: InteractionRef,
        reply: InteractionReply,
    ) -> BoxFuture<'static, DiscordResult<()>> {
        let client = self.clone();
        Box::pin(async move { client.patch_original_reply(interaction, reply).await })
    }

    fn register_commands(
        &self,
        application_id: Snowflake,
        guild_id: Option<Snowflake>,
        commands: Vec<CommandDefinition>,
    ) -> BoxFuture<'static, DiscordResult<()>> {
        let client = self.clone();
        Box::pin(async move { client.put_commands(application_id, guild_id, commands).await })
    }
}

fn message_path(message: MessageRef) -> String {
    format!(
        "/channels/{}/messages/{}",
        message.channel_id, message.message_id
    )
}

fn interaction_callback_body(reply: &InteractionReply) -> Value {
    let mut data = reply_message_data(reply);
    data["flags"] = json!(FLAG_EPHEMERAL);
    json!({
        "type": CALLBACK_CHANNEL_MESSAGE,
        "data": data,
    })
}

fn reply_message_data(reply: &InteractionReply) -> Value {
    let mut data = json!({ "content": reply.content });
    if let Some(menu) = &reply.select {
        data["components"] = select_menu_components(menu);
    }
    data
}

fn select_menu_components(menu: &SelectMenu) -> Value {
    let options = menu
        .options
        .iter()
        .map(|label| json!({ "label": label, "value": label }))
        .collect::<Vec<_>>();
    json!([{
        "type": 1,
        "components": [{
            "type": 3,
            "custom_id": menu.custom_id,
            "placeholder": menu.placeholder,
            "min_values": 1,
            "max_values": 1,
            "options": options,
        }]
    }])
}
