use std::{future::Future, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    time::{Instant, sleep},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    discord::{error::DiscordResult, events::GatewayEvent},
    services::dispatcher::EventDispatcher,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(30);
/// A session that lived this long resets the backoff.
const STABLE_SESSION: Duration = Duration::from_secs(60);
const EVENT_BUFFER: usize = 64;

/// Keep a gateway session alive, feeding its events to `dispatcher`, and keep
/// the shared state degraded while disconnected.
///
/// `connect` drives one session and returns `Ok(())` only when cancelled.
pub async fn run<F, Fut>(state: SharedState, dispatcher: Arc<EventDispatcher>, mut connect: F)
where
    F: FnMut(mpsc::Sender<GatewayEvent>, CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = DiscordResult<()>> + Send,
{
    let cancel = state.shutdown_token();
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let pump = tokio::spawn(dispatcher.pump(events_rx, cancel.clone()));
    let mut delay = INITIAL_DELAY;

    loop {
        let started = Instant::now();
        match connect(events_tx.clone(), cancel.clone()).await {
            Ok(()) => break,
            Err(err) => {
                state.set_gateway_connected(false);
                if started.elapsed() >= STABLE_SESSION {
                    delay = INITIAL_DELAY;
                }
                warn!(
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "gateway session ended; entering degraded mode"
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(delay) => {}
        }
        delay = (delay * 2).min(MAX_DELAY);
    }

    state.set_gateway_connected(false);
    drop(events_tx);
    if let Err(err) = pump.await {
        warn!(error = %err, "event pump task failed");
    }
    info!("gateway supervisor stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::{
        discord::{error::DiscordError, events::ReadyEvent},
        services::dispatcher::default_dispatcher,
        test_support::TestApp,
    };

    #[tokio::test(start_paused = true)]
    async fn reconnects_with_backoff_until_cancelled() {
        let app = TestApp::new(&[]);
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let dispatcher = Arc::new(EventDispatcher::new());

        let started = Instant::now();
        run(app.state.clone(), dispatcher, move |_events, cancel| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    return Err(DiscordError::SessionEnded("closed".into()));
                }
                cancel.cancel();
                Ok(())
            }
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        // 1s + 2s + 4s of backoff between the four attempts.
        assert!(started.elapsed() >= Duration::from_secs(7));
        assert!(app.state.is_degraded());
    }

    #[tokio::test]
    async fn session_events_reach_the_dispatcher() {
        let app = TestApp::new(&["Chess"]);
        let dispatcher = Arc::new(default_dispatcher(&app.state));
        let state = app.state.clone();

        run(app.state.clone(), dispatcher, move |events, cancel| {
            let state = state.clone();
            async move {
                events
                    .send(GatewayEvent::Ready(ReadyEvent {
                        application_id: 1,
                        bot_user_id: 2,
                    }))
                    .await
                    .unwrap();
                // Wait for the ready handler to post the initial poll.
                while state.polls().snapshot().await.is_none() {
                    tokio::task::yield_now().await;
                }
                cancel.cancel();
                Ok(())
            }
        })
        .await;

        assert_eq!(app.messenger.sent_polls().len(), 1);
        assert_eq!(app.responder.registrations().len(), 1);
    }
}
