use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use giveaway_train::config::AppConfig;
use giveaway_train::lifecycle::Engine;
use giveaway_train::server::{AppState, build_router};
use giveaway_train::store::SnapshotStore;
use giveaway_train::transport::{DryRunTransport, TelegramClient, Transport};
use giveaway_train::updates::{Chats, run_update_loop};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "giveaway_train=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let store = match SnapshotStore::open(&config.state_path) {
        Ok(store) => store,
        Err(e) => {
            error!(path = %config.state_path.display(), error = %e, "could not open store");
            return ExitCode::FAILURE;
        }
    };

    let result = match config.bot_token.clone() {
        Some(token) => match TelegramClient::new(&token, config.channel, config.operator) {
            Ok(client) => run(config, store, client.clone(), Some(client)).await,
            Err(e) => {
                error!(error = %e, "could not build the Telegram client");
                return ExitCode::FAILURE;
            }
        },
        None => {
            warn!("BOT_TOKEN not set, running with the dry-run transport");
            run(config, store, DryRunTransport::new(), None).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run<T: Transport>(
    config: AppConfig,
    store: SnapshotStore,
    transport: T,
    updates: Option<TelegramClient>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    let engine = Engine::new(store, transport, config.lifecycle.clone());
    match engine.recover().await {
        Ok(report) => info!(
            spawned = report.spawned(),
            ended = report.ended.len(),
            "recovered contests"
        ),
        Err(e) => error!(error = %e, "recovery failed, starting without runners"),
    }

    let shutdown = CancellationToken::new();
    let update_loop = updates.map(|client| {
        let chats = Chats {
            discussion_group: config.discussion_group,
            operator: config.operator,
        };
        tokio::spawn(run_update_loop(
            Arc::clone(&engine),
            client,
            chats,
            shutdown.clone(),
        ))
    });

    let app = build_router(AppState::new(Arc::clone(&engine)));
    info!("listening on {}", config.listen_addr);

    let signal = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
            signal.cancel();
        })
        .await;

    shutdown.cancel();
    if let Some(handle) = update_loop
        && let Err(e) = handle.await
    {
        error!(error = %e, "update loop panicked");
    }
    engine.shutdown().await;
    served
}
