//! soiree-poll binary entrypoint wiring the Discord gateway, the daily
//! scheduler and the HTTP status surface.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soiree_poll::{
    config::{self, DiscordConfig, PollSettings},
    dao::{option_store::JsonFileOptionStore, options::OptionRepository},
    discord::{DiscordRestClient, GatewaySession},
    routes,
    services::{dispatcher::default_dispatcher, gateway_supervisor, scheduler},
    state::{AppState, SharedState, lifecycle::PollLifecycle},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = PollSettings::load();
    let discord = DiscordConfig::from_env().context("reading Discord configuration")?;
    let channel_id = match discord.poll_channel.clone() {
        Ok(id) => Some(id),
        Err(err) => {
            warn!(error = %err, "poll channel unavailable; polls and scheduler disabled");
            None
        }
    };

    let options_path = config::options_path();
    info!(path = %options_path.display(), "using option file");
    let options = OptionRepository::new(Arc::new(JsonFileOptionStore::new(options_path)));

    let rest = Arc::new(
        DiscordRestClient::new(&discord.bot_token).context("building Discord REST client")?,
    );
    let polls = PollLifecycle::new(rest.clone(), channel_id, settings);
    let app_state = AppState::new(options, polls, rest, discord.guild_id);

    match scheduler::spawn(app_state.clone()) {
        Ok(_) => info!("daily scheduler started"),
        Err(err) => warn!(error = %err, "daily scheduler not started"),
    }

    let session = GatewaySession::new(&discord.bot_token);
    let dispatcher = Arc::new(default_dispatcher(&app_state));
    let gateway = tokio::spawn(gateway_supervisor::run(
        app_state.clone(),
        dispatcher,
        move |events, cancel| {
            let session = session.clone();
            async move { session.run(&events, &cancel).await }
        },
    ));

    let app = build_router(app_state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config::http_port()));
    info!(%addr, "starting status server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let shutdown = app_state.shutdown_token();
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("serving axum")?;

    gateway.await.context("joining gateway supervisor")?;
    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM, then cancel `shutdown` so every background
/// loop stops with the server.
async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown requested");
    shutdown.cancel();
}
