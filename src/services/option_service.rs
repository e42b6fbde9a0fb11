use std::sync::Arc;

use tracing::{info, warn};
use validator::Validate;

use crate::{
    dto::commands::OptionLabelInput,
    error::ServiceError,
    state::{
        SharedState,
        lifecycle::{ResyncOutcome, SkipReason},
        poll::ActivePoll,
    },
};

/// What happened to the live poll after an option edit.
#[derive(Debug)]
pub enum ResyncStatus {
    /// The poll was reposted with the edited list.
    Resynced(Arc<ActivePoll>),
    /// The poll was kept as is.
    Skipped(SkipReason),
    /// The edit is persisted but the poll could not be refreshed.
    Failed(ServiceError),
}

/// Result of a successful option edit.
#[derive(Debug)]
pub struct EditOutcome {
    /// Label as stored (trimmed for additions).
    pub label: String,
    /// Stored list after the edit.
    pub options: Vec<String>,
    pub resync: ResyncStatus,
}

/// Validate and store a new option, then refresh the poll if nobody voted yet.
pub async fn add_option(state: &SharedState, raw_label: &str) -> Result<EditOutcome, ServiceError> {
    let input = OptionLabelInput::new(raw_label);
    input.validate()?;

    let options = state.options().add(&input.label).await?;
    let resync = resync(state, &options).await;
    Ok(EditOutcome {
        label: input.label,
        options,
        resync,
    })
}

/// Remove a stored option, then refresh the poll if nobody voted yet.
pub async fn remove_option(state: &SharedState, label: &str) -> Result<EditOutcome, ServiceError> {
    let options = state.options().remove(label).await?;
    let resync = resync(state, &options).await;
    Ok(EditOutcome {
        label: label.to_owned(),
        options,
        resync,
    })
}

/// Options offered for removal.
pub async fn removable_options(state: &SharedState) -> Result<Vec<String>, ServiceError> {
    let options = list_options(state).await?;
    if options.is_empty() {
        return Err(ServiceError::NoOptionsAvailable);
    }
    Ok(options)
}

/// Stored option list.
pub async fn list_options(state: &SharedState) -> Result<Vec<String>, ServiceError> {
    Ok(state.options().load().await?)
}

async fn resync(state: &SharedState, options: &[String]) -> ResyncStatus {
    match state.polls().resync_if_unvoted(options).await {
        Ok(ResyncOutcome::Resynced(poll)) => ResyncStatus::Resynced(poll),
        Ok(ResyncOutcome::Skipped(reason)) => {
            info!(reason = ?reason, "option edit stored; poll left as is");
            ResyncStatus::Skipped(reason)
        }
        Err(err) => {
            warn!(error = %err, "option edit stored but poll resync failed");
            ResyncStatus::Failed(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::options::MAX_STORED_OPTIONS,
        test_support::{TestApp, options},
    };

    async fn post_poll(app: &TestApp) -> Arc<ActivePoll> {
        let stored = app.state.options().load().await.unwrap();
        app.state.polls().ensure_active(&stored).await.unwrap()
    }

    #[tokio::test]
    async fn duplicate_add_is_rejected_without_resync() {
        let app = TestApp::new(&["Chess", "Cards"]);
        post_poll(&app).await;

        let err = add_option(&app.state, "Cards").await.unwrap_err();

        assert!(matches!(err, ServiceError::DuplicateOption(ref label) if label == "Cards"));
        assert_eq!(app.messenger.sent_polls().len(), 1);
        assert!(app.messenger.deleted().is_empty());
        assert_eq!(
            app.state.options().load().await.unwrap(),
            options(&["Chess", "Cards"])
        );
    }

    #[tokio::test]
    async fn removing_unvoted_option_resyncs_poll() {
        let app = TestApp::new(&["Chess", "Cards"]);
        let first = post_poll(&app).await;

        let outcome = remove_option(&app.state, "Chess").await.unwrap();

        assert_eq!(outcome.options, options(&["Cards"]));
        let ResyncStatus::Resynced(poll) = outcome.resync else {
            panic!("expected resync, got {:?}", outcome.resync);
        };
        assert_eq!(poll.labels(), vec!["Cards", "Other", "Not playing"]);
        assert_eq!(poll.question, first.question);
        assert_eq!(poll.duration_hours, first.duration_hours);
    }

    #[tokio::test]
    async fn voted_poll_is_kept_after_add() {
        let app = TestApp::new(&["Chess"]);
        let first = post_poll(&app).await;
        app.messenger.record_votes(first.message, "Chess", 2);

        let outcome = add_option(&app.state, "Go").await.unwrap();

        assert!(matches!(
            outcome.resync,
            ResyncStatus::Skipped(SkipReason::HasVotes { votes: 2 })
        ));
        assert!(Arc::ptr_eq(
            &app.state.polls().snapshot().await.unwrap(),
            &first
        ));
        assert_eq!(outcome.options, options(&["Chess", "Go"]));
    }

    #[tokio::test]
    async fn add_trims_and_validates_label() {
        let app = TestApp::new(&[]);

        let outcome = add_option(&app.state, "  Chess  ").await.unwrap();
        assert_eq!(outcome.label, "Chess");
        assert!(matches!(
            outcome.resync,
            ResyncStatus::Skipped(SkipReason::NoActivePoll)
        ));

        let err = add_option(&app.state, &"x".repeat(56)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOption(_)));
        assert!(matches!(
            add_option(&app.state, "").await,
            Err(ServiceError::InvalidOption(_))
        ));
        assert_eq!(app.state.options().load().await.unwrap(), options(&["Chess"]));
    }

    #[tokio::test]
    async fn resync_failure_keeps_the_edit() {
        let app = TestApp::new(&["Chess"]);
        post_poll(&app).await;
        app.messenger.fail_fetches(true);

        let outcome = add_option(&app.state, "Cards").await.unwrap();

        assert!(matches!(
            outcome.resync,
            ResyncStatus::Failed(ServiceError::DeliveryFailed(_))
        ));
        assert_eq!(
            app.state.options().load().await.unwrap(),
            options(&["Chess", "Cards"])
        );
    }

    #[tokio::test]
    async fn failed_repost_keeps_the_edit() {
        let app = TestApp::new(&["Chess", "Cards"]);
        let first = post_poll(&app).await;
        app.messenger.fail_sends(true);

        let outcome = remove_option(&app.state, "Chess").await.unwrap();

        assert!(matches!(
            outcome.resync,
            ResyncStatus::Failed(ServiceError::DeliveryFailed(_))
        ));
        assert_eq!(app.state.options().load().await.unwrap(), options(&["Cards"]));
        assert_eq!(app.messenger.deleted(), vec![first.message]);
        assert!(app.state.polls().snapshot().await.is_none());
    }

    #[tokio::test]
    async fn full_list_rejects_new_options() {
        let labels = (0..MAX_STORED_OPTIONS)
            .map(|i| format!("Game {i}"))
            .collect::<Vec<_>>();
        let refs = labels.iter().map(String::as_str).collect::<Vec<_>>();
        let app = TestApp::new(&refs);

        assert!(matches!(
            add_option(&app.state, "Chess").await,
            Err(ServiceError::OptionLimitReached { .. })
        ));
    }

    #[tokio::test]
    async fn nothing_to_remove_from_empty_list() {
        let app = TestApp::new(&[]);
        assert!(matches!(
            removable_options(&app.state).await,
            Err(ServiceError::NoOptionsAvailable)
        ));
        assert!(matches!(
            remove_option(&app.state, "Chess").await,
            Err(ServiceError::UnknownOption(_))
        ));
    }
}
