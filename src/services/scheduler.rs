//! Daily recreation of the poll at a fixed local time.

use std::sync::Arc;

use chrono::{DateTime, Days, Local, NaiveTime, TimeDelta, TimeZone};
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    error::ServiceError,
    state::{SharedState, poll::ActivePoll, scheduler::SchedulerEvent},
};

/// Start the daily loop on its own task.
///
/// Fails with [`ServiceError::ConfigMissing`] when no poll channel is
/// configured; nothing is spawned in that case.
pub fn spawn(state: SharedState) -> Result<JoinHandle<()>, ServiceError> {
    if state.polls().channel_id().is_none() {
        return Err(ServiceError::ConfigMissing(
            "POLL_CHANNEL_ID is missing or invalid".into(),
        ));
    }
    let cancel = state.shutdown_token();
    Ok(tokio::spawn(run(state, cancel)))
}

/// Sleep until each daily target, recreate the poll, then settle. Returns once
/// `cancel` fires.
pub async fn run(state: SharedState, cancel: CancellationToken) {
    let settings = state.polls().settings().clone();

    loop {
        let now = Local::now();
        let next_fire = next_fire_after(&now, settings.daily_at);
        if state
            .apply_schedule_event(SchedulerEvent::Scheduled(next_fire))
            .await
            .is_err()
        {
            break;
        }
        info!(next_fire = %next_fire, "next daily poll scheduled");

        let wait = (next_fire - now).to_std().unwrap_or_default();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(wait) => {}
        }

        if state.apply_schedule_event(SchedulerEvent::Woke).await.is_err() {
            break;
        }
        // A recreation is never abandoned halfway: the poll it posts must be tracked.
        match fire(&state, settings.allow_multiselect).await {
            Ok(poll) => info!(poll_id = %poll.id, "daily poll posted"),
            Err(err) => warn!(error = %err, "daily poll recreation failed"),
        }
        if cancel.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(settings.settle_buffer) => {}
        }
        if state.apply_schedule_event(SchedulerEvent::Settled).await.is_err() {
            break;
        }
    }

    let _ = state.apply_schedule_event(SchedulerEvent::Stop).await;
    info!("daily scheduler stopped");
}

/// Recreate today's poll from the stored options, whatever the vote state.
pub async fn fire(
    state: &SharedState,
    allow_multiselect: bool,
) -> Result<Arc<ActivePoll>, ServiceError> {
    let options = state.options().load().await?;
    state.polls().recreate(&options, allow_multiselect).await
}

/// First occurrence of `at` strictly after `now`, in `now`'s time zone.
///
/// When the wall-clock time does not exist that day (DST gap) the target moves
/// one hour later; when it exists twice the earlier instant is used.
pub fn next_fire_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let today = now.date_naive();
    let day = if now.time() < at {
        Some(today)
    } else {
        today.checked_add_days(Days::new(1))
    };

    let tz = now.timezone();
    day.and_then(|day| {
        let target = day.and_time(at);
        tz.from_local_datetime(&target)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(target + TimeDelta::hours(1))).earliest())
    })
    .unwrap_or_else(|| now.clone() + TimeDelta::days(1))
}
