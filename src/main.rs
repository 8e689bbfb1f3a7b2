//! NotiSync Agent — keeps one notification inbox in sync
//!
//! Main entry point that wires the REST client, push transport, and session
//! manager together and follows the configured inbox until shutdown.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use notisync_core::config::AppConfig;
use notisync_core::error::AppError;
use notisync_core::events::{InboxEvent, InboxEvents};
use notisync_http::HttpNotificationApi;
use notisync_realtime::{SessionManager, TungsteniteTransport};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Agent error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("NOTISYNC_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    AppConfig::load(&config_path)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main agent run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting NotiSync agent v{}", env!("CARGO_PKG_VERSION"));

    let inbox = config.default_inbox()?.ok_or_else(|| {
        AppError::configuration("[inbox] user_id and user_type must be set for the agent")
    })?;

    let api = Arc::new(HttpNotificationApi::new(&config.api)?);
    let transport = Arc::new(TungsteniteTransport::new(config.realtime.max_frame_bytes));
    let events = InboxEvents::default();
    let mut bus = events.subscribe();
    let manager = SessionManager::new(config, api, transport, events);

    let session = manager.mount(inbox).await;
    let mut states = session.connection_changes();
    tracing::info!(session = %session.id(), inbox = %inbox, "Inbox mounted");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
            event = bus.recv() => match event {
                Ok(InboxEvent::StateChanged { inbox, unread_count }) => {
                    tracing::info!(inbox = %inbox, unread_count, "Unread count changed");
                }
                Ok(InboxEvent::ResyncRequested { .. }) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event listener lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                tracing::info!(inbox = %inbox, state = %state, "Push channel state");
            }
        }
    }

    let metrics = session.metrics();
    manager.shutdown().await;
    tracing::info!(?metrics, "NotiSync agent stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
