//! Owner of the single active poll.
//!
//! Every mutating operation takes the lifecycle gate for its whole duration,
//! network calls included, so two recreations can never interleave their
//! sends or deletes. The current poll is published as an `Arc` snapshot that
//! readers may hold while it goes stale.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    config::PollSettings,
    discord::{
        Messenger,
        error::DiscordError,
        models::{PollDraft, Snowflake, ThreadRef},
    },
    error::ServiceError,
    state::poll::{ActivePoll, PollId, build_answers, real_votes, tally},
};

/// Result of [`PollLifecycle::resync_if_unvoted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// The previous poll was replaced by this one.
    Resynced(Arc<ActivePoll>),
    /// The active poll was left untouched.
    Skipped(SkipReason),
}

/// Why a resync left the active poll alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// There is no poll to resync.
    NoActivePoll,
    /// Users already voted on real options.
    HasVotes { votes: u32 },
}

/// Result of [`PollLifecycle::open_overflow_thread`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadOutcome {
    /// The thread was opened on the poll message.
    Created(ThreadRef),
    /// The poll already has its thread.
    AlreadyCreated,
    /// The poll the vote referred to is no longer active.
    Superseded,
}

/// Serialized owner of the active poll reference.
pub struct PollLifecycle {
    messenger: Arc<dyn Messenger>,
    channel_id: Option<Snowflake>,
    settings: PollSettings,
    gate: Mutex<()>,
    active: RwLock<Option<Arc<ActivePoll>>>,
}

impl PollLifecycle {
    /// Build a manager posting to `channel_id`. Without a channel every
    /// creation fails with [`ServiceError::ConfigMissing`].
    pub fn new(
        messenger: Arc<dyn Messenger>,
        channel_id: Option<Snowflake>,
        settings: PollSettings,
    ) -> Self {
        Self {
            messenger,
            channel_id,
            settings,
            gate: Mutex::new(()),
            active: RwLock::new(None),
        }
    }

    /// Channel polls are posted to, if configured.
    pub fn channel_id(&self) -> Option<Snowflake> {
        self.channel_id
    }

    /// Poll wording and scheduling settings.
    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Immutable view of the current poll.
    pub async fn snapshot(&self) -> Option<Arc<ActivePoll>> {
        self.active.read().await.clone()
    }

    /// Post a poll with `options` plus the sentinels and make it the active one.
    ///
    /// On failure the previous active poll, if any, is kept unchanged.
    pub async fn create(
        &self,
        options: &[String],
        question: &str,
        duration_hours: u32,
        allow_multiselect: bool,
    ) -> Result<Arc<ActivePoll>, ServiceError> {
        let _gate = self.gate.lock().await;
        self.create_locked(options, question, duration_hours, allow_multiselect)
            .await
    }

    /// Create the first poll of the process unless one is already active.
    pub async fn ensure_active(&self, options: &[String]) -> Result<Arc<ActivePoll>, ServiceError> {
        let _gate = self.gate.lock().await;
        if let Some(current) = self.snapshot().await {
            debug!(poll_id = %current.id, "active poll already present");
            return Ok(current);
        }
        self.create_locked(
            options,
            &self.settings.question,
            self.settings.duration_hours,
            self.settings.allow_multiselect,
        )
        .await
    }

    /// Replace the active poll with one built from `fresh_options`, unless real
    /// votes were already cast. Question, duration and multiselect are carried over.
    pub async fn resync_if_unvoted(
        &self,
        fresh_options: &[String],
    ) -> Result<ResyncOutcome, ServiceError> {
        let _gate = self.gate.lock().await;
        let Some(current) = self.snapshot().await else {
            debug!("no active poll to resync");
            return Ok(ResyncOutcome::Skipped(SkipReason::NoActivePoll));
        };

        match self.messenger.fetch_message(current.message).await {
            Ok(Some(live)) => {
                let votes = real_votes(&tally(&live));
                if votes > 0 {
                    info!(poll_id = %current.id, votes, "poll already has votes; keeping it");
                    return Ok(ResyncOutcome::Skipped(SkipReason::HasVotes { votes }));
                }
                if let Err(err) = self.delete_message(&current).await {
                    warn!(poll_id = %current.id, error = %err, "failed to delete poll for resync");
                    return Err(ServiceError::DeliveryFailed(err));
                }
            }
            Ok(None) => {
                info!(
                    poll_id = %current.id,
                    message_id = current.message.message_id,
                    "active poll was removed externally; recreating"
                );
            }
            Err(err) => {
                warn!(poll_id = %current.id, error = %err, "failed to fetch poll results");
                return Err(ServiceError::DeliveryFailed(err));
            }
        }

        self.publish(None).await;
        let poll = self
            .create_locked(
                fresh_options,
                &current.question,
                current.duration_hours,
                current.allow_multiselect,
            )
            .await?;
        info!(previous = %current.id, poll_id = %poll.id, "poll resynced with edited options");
        Ok(ResyncOutcome::Resynced(poll))
    }

    /// Delete the active poll if any and post a fresh one regardless of votes.
    pub async fn recreate(
        &self,
        options: &[String],
        allow_multiselect: bool,
    ) -> Result<Arc<ActivePoll>, ServiceError> {
        let _gate = self.gate.lock().await;
        if let Some(current) = self.snapshot().await {
            match self.delete_message(&current).await {
                Ok(()) => info!(poll_id = %current.id, "previous poll deleted"),
                Err(err) => {
                    warn!(poll_id = %current.id, error = %err, "failed to delete previous poll; continuing")
                }
            }
            self.publish(None).await;
        }

        self.create_locked(
            options,
            &self.settings.question,
            self.settings.duration_hours,
            allow_multiselect,
        )
        .await
    }

    /// Delete the active poll message and clear the reference.
    ///
    /// Returns `Ok(false)` when there was nothing to delete. The reference is
    /// cleared even when the platform refuses the deletion.
    pub async fn delete_active(&self) -> Result<bool, ServiceError> {
        let _gate = self.gate.lock().await;
        let Some(current) = self.snapshot().await else {
            return Ok(false);
        };
        self.publish(None).await;

        match self.delete_message(&current).await {
            Ok(()) => {
                info!(poll_id = %current.id, "active poll deleted");
                Ok(true)
            }
            Err(err) => {
                warn!(poll_id = %current.id, error = %err, "failed to delete active poll");
                Err(ServiceError::DeliveryFailed(err))
            }
        }
    }

    /// Open the overflow thread for `poll_id` unless it exists or the poll is gone.
    pub async fn open_overflow_thread(
        &self,
        poll_id: PollId,
    ) -> Result<ThreadOutcome, ServiceError> {
        let _gate = self.gate.lock().await;
        let Some(current) = self.snapshot().await.filter(|poll| poll.id == poll_id) else {
            return Ok(ThreadOutcome::Superseded);
        };
        if current.thread_created {
            return Ok(ThreadOutcome::AlreadyCreated);
        }

        let thread = self
            .messenger
            .create_thread(
                current.message,
                self.settings.thread_name.clone(),
                self.settings.thread_auto_archive_minutes,
            )
            .await
            .map_err(ServiceError::ThreadCreateFailed)?;

        self.publish(Some(Arc::new(current.with_thread()))).await;
        info!(poll_id = %poll_id, thread_id = thread.id, "overflow thread created");
        Ok(ThreadOutcome::Created(thread))
    }

    async fn create_locked(
        &self,
        options: &[String],
        question: &str,
        duration_hours: u32,
        allow_multiselect: bool,
    ) -> Result<Arc<ActivePoll>, ServiceError> {
        let answers = build_answers(options);
        if answers.is_empty() {
            return Err(ServiceError::NoOptions);
        }
        let channel_id = self
            .channel_id
            .ok_or_else(|| ServiceError::ConfigMissing("poll channel id is not configured".into()))?;

        let draft = PollDraft {
            content: self.settings.content.clone(),
            question: question.to_owned(),
            duration_hours,
            allow_multiselect,
            answers,
        };

        let posted = self
            .messenger
            .send_poll(channel_id, draft)
            .await
            .map_err(|err| {
                warn!(channel_id, error = %err, "failed to send poll");
                ServiceError::DeliveryFailed(err)
            })?;

        let poll = Arc::new(ActivePoll::posted(
            &posted,
            question,
            duration_hours,
            allow_multiselect,
        ));
        self.publish(Some(poll.clone())).await;
        info!(
            poll_id = %poll.id,
            message_id = poll.message.message_id,
            answers = poll.answers.len(),
            "poll created"
        );
        Ok(poll)
    }

    /// Delete the poll message, treating an already-gone message as deleted.
    async fn delete_message(&self, poll: &ActivePoll) -> Result<(), DiscordError> {
        match self.messenger.delete_message(poll.message).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                debug!(poll_id = %poll.id, "poll message already gone");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn publish(&self, poll: Option<Arc<ActivePoll>>) {
        *self.active.write().await = poll;
    }
}
