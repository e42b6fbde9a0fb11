//! In-memory Discord fakes shared by unit tests.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use futures::future::{BoxFuture, FutureExt};
use reqwest::StatusCode;

use crate::{
    config::PollSettings,
    dao::{option_store::MemoryOptionStore, options::OptionRepository},
    discord::{
        InteractionResponder, Messenger,
        error::{DiscordError, DiscordResult},
        models::{
            AnswerCount, CommandDefinition, InteractionRef, InteractionReply, MessageRef,
            PollAnswerRef, PollDraft, PollMessage, Snowflake, ThreadRef,
        },
    },
    state::{AppState, SharedState, lifecycle::PollLifecycle},
};

pub const TEST_CHANNEL: Snowflake = 7;

pub fn options(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|label| (*label).to_owned()).collect()
}

fn refused(path: &str) -> DiscordError {
    DiscordError::RequestStatus {
        path: path.to_owned(),
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: "unavailable".into(),
    }
}

#[derive(Default)]
struct MessengerState {
    next_id: Snowflake,
    live: BTreeMap<Snowflake, PollMessage>,
    sent: Vec<(Snowflake, PollDraft)>,
    deleted: Vec<MessageRef>,
    threads: Vec<(MessageRef, String)>,
    fail_sends: bool,
    fail_fetches: bool,
    fail_deletes: bool,
    fail_threads: bool,
}

/// Messenger keeping posted polls in memory. Answer ids start at 1.
#[derive(Default, Clone)]
pub struct FakeMessenger {
    inner: Arc<Mutex<MessengerState>>,
}

impl FakeMessenger {
    fn with<T>(&self, f: impl FnOnce(&mut MessengerState) -> T) -> T {
        let mut guard = self.inner.lock().unwrap();
        f(&mut guard)
    }

    pub fn sent_polls(&self) -> Vec<(Snowflake, PollDraft)> {
        self.with(|state| state.sent.clone())
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.with(|state| state.deleted.clone())
    }

    pub fn threads(&self) -> Vec<(MessageRef, String)> {
        self.with(|state| state.threads.clone())
    }

    pub fn live_messages(&self) -> Vec<MessageRef> {
        self.with(|state| state.live.values().map(|poll| poll.message).collect())
    }

    pub fn fail_sends(&self, fail: bool) {
        self.with(|state| state.fail_sends = fail);
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.with(|state| state.fail_fetches = fail);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.with(|state| state.fail_deletes = fail);
    }

    pub fn fail_threads(&self, fail: bool) {
        self.with(|state| state.fail_threads = fail);
    }

    /// Remove a message as if a moderator deleted it.
    pub fn forget(&self, message: MessageRef) {
        self.with(|state| state.live.remove(&message.message_id));
    }

    /// Set the result count of the answer labelled `label`.
    pub fn record_votes(&self, message: MessageRef, label: &str, count: u32) {
        self.with(|state| {
            let poll = state
                .live
                .get_mut(&message.message_id)
                .expect("poll message is live");
            let answer_id = poll
                .answers
                .iter()
                .find(|answer| answer.label == label)
                .map(|answer| answer.answer_id)
                .expect("label is part of the poll");
            poll.answer_counts.retain(|entry| entry.answer_id != answer_id);
            poll.answer_counts.push(AnswerCount { answer_id, count });
        });
    }
}

impl Messenger for FakeMessenger {
    fn send_poll(
        &self,
        channel_id: Snowflake,
        draft: PollDraft,
    ) -> BoxFuture<'static, DiscordResult<PollMessage>> {
        let result = self.with(|state| {
            if state.fail_sends {
                return Err(refused("/messages"));
            }
            state.next_id += 1;
            let message = MessageRef {
                channel_id,
                message_id: 1000 + state.next_id,
            };
            let poll = PollMessage {
                message,
                question: draft.question.clone(),
                answers: draft
                    .answers
                    .iter()
                    .enumerate()
                    .map(|(index, label)| PollAnswerRef {
                        answer_id: index as u32 + 1,
                        label: label.clone(),
                    })
                    .collect(),
                answer_counts: Vec::new(),
            };
            state.live.insert(message.message_id, poll.clone());
            state.sent.push((channel_id, draft));
            Ok(poll)
        });
        async move { result }.boxed()
    }

    fn delete_message(&self, message: MessageRef) -> BoxFuture<'static, DiscordResult<()>> {
        let result = self.with(|state| {
            if state.fail_deletes {
                return Err(refused("/messages"));
            }
            match state.live.remove(&message.message_id) {
                Some(_) => {
                    state.deleted.push(message);
                    Ok(())
                }
                None => Err(DiscordError::NotFound {
                    path: format!("/messages/{}", message.message_id),
                }),
            }
        });
        async move { result }.boxed()
    }

    fn fetch_message(
        &self,
        message: MessageRef,
    ) -> BoxFuture<'static, DiscordResult<Option<PollMessage>>> {
        let result = self.with(|state| {
            if state.fail_fetches {
                return Err(refused("/messages"));
            }
            Ok(state.live.get(&message.message_id).cloned())
        });
        async move { result }.boxed()
    }

    fn create_thread(
        &self,
        message: MessageRef,
        name: String,
        _auto_archive_minutes: u16,
    ) -> BoxFuture<'static, DiscordResult<ThreadRef>> {
        let result = self.with(|state| {
            if state.fail_threads {
                return Err(refused("/threads"));
            }
            state.threads.push((message, name.clone()));
            Ok(ThreadRef {
                id: 5000 + state.threads.len() as Snowflake,
                name,
            })
        });
        async move { result }.boxed()
    }
}

#[derive(Default)]
struct ResponderState {
    replies: Vec<(InteractionRef, InteractionReply)>,
    deferred: Vec<InteractionRef>,
    edits: Vec<(InteractionRef, InteractionReply)>,
    registrations: Vec<(Snowflake, Option<Snowflake>, Vec<CommandDefinition>)>,
    fail_registration: bool,
}

/// Responder recording every reply, deferral and command registration.
#[derive(Default, Clone)]
pub struct FakeResponder {
    inner: Arc<Mutex<ResponderState>>,
}

impl FakeResponder {
    pub fn replies(&self) -> Vec<(InteractionRef, InteractionReply)> {
        self.inner.lock().unwrap().replies.clone()
    }

    pub fn deferred(&self) -> Vec<InteractionRef> {
        self.inner.lock().unwrap().deferred.clone()
    }

    pub fn edits(&self) -> Vec<(InteractionRef, InteractionReply)> {
        self.inner.lock().unwrap().edits.clone()
    }

    pub fn registrations(&self) -> Vec<(Snowflake, Option<Snowflake>, Vec<CommandDefinition>)> {
        self.inner.lock().unwrap().registrations.clone()
    }

    pub fn fail_registration(&self, fail: bool) {
        self.inner.lock().unwrap().fail_registration = fail;
    }
}

impl InteractionResponder for FakeResponder {
    fn respond(
        &self,
        interaction: InteractionRef,
        reply: InteractionReply,
    ) -> BoxFuture<'static, DiscordResult<()>> {
        self.inner.lock().unwrap().replies.push((interaction, reply));
        async { Ok(()) }.boxed()
    }

    fn defer(&self, interaction: InteractionRef) -> BoxFuture<'static, DiscordResult<()>> {
        self.inner.lock().unwrap().deferred.push(interaction);
        async { Ok(()) }.boxed()
    }

    fn edit_reply(
        &self,
        interaction: InteractionRef,
        reply: InteractionReply,
    ) -> BoxFuture<'static, DiscordResult<()>> {
        let mut state = self.inner.lock().unwrap();
        // Discord rejects edits of an interaction that was never acknowledged.
        let result = if state.deferred.contains(&interaction) {
            state.edits.push((interaction, reply));
            Ok(())
        } else {
            Err(DiscordError::NotFound {
                path: format!("/webhooks/{}/messages/@original", interaction.id),
            })
        };
        async move { result }.boxed()
    }

    fn register_commands(
        &self,
        application_id: Snowflake,
        guild_id: Option<Snowflake>,
        commands: Vec<CommandDefinition>,
    ) -> BoxFuture<'static, DiscordResult<()>> {
        let mut state = self.inner.lock().unwrap();
        let result = if state.fail_registration {
            Err(refused("/commands"))
        } else {
            state
                .registrations
                .push((application_id, guild_id, commands));
            Ok(())
        };
        async move { result }.boxed()
    }
}

/// Application state wired to fakes, with `labels` preloaded in the option store.
pub struct TestApp {
    pub state: SharedState,
    pub messenger: FakeMessenger,
    pub responder: FakeResponder,
}

impl TestApp {
    pub fn new(labels: &[&str]) -> Self {
        Self::with_channel(labels, Some(TEST_CHANNEL))
    }

    pub fn with_channel(labels: &[&str], channel_id: Option<Snowflake>) -> Self {
        let messenger = FakeMessenger::default();
        let responder = FakeResponder::default();
        let repository = OptionRepository::new(Arc::new(MemoryOptionStore::with_options(
            labels.iter().copied(),
        )));
        let lifecycle = PollLifecycle::new(
            Arc::new(messenger.clone()),
            channel_id,
            PollSettings::default(),
        );
        let state = AppState::new(repository, lifecycle, Arc::new(responder.clone()), None);
        Self {
            state,
            messenger,
            responder,
        }
    }
}
