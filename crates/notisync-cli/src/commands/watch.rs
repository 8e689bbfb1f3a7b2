//! Live inbox follower.

use std::sync::Arc;

use clap::Args;
use tracing::info;

use super::notification::NotificationRow;
use crate::output::{self, OutputFormat};
use notisync_core::config::AppConfig;
use notisync_core::error::AppError;
use notisync_core::events::InboxEvents;
use notisync_core::types::InboxId;
use notisync_realtime::{SessionManager, TungsteniteTransport};
use notisync_service::StoreSnapshot;

/// Arguments for the watch command
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only print the unread count on each change
    #[arg(long)]
    pub count_only: bool,

    /// Poll only; do not open the push channel
    #[arg(long)]
    pub no_push: bool,
}

/// Execute the watch command
pub async fn execute(
    args: &WatchArgs,
    mut config: AppConfig,
    inbox: InboxId,
    format: OutputFormat,
) -> Result<(), AppError> {
    if args.no_push {
        config.realtime.enabled = false;
    }
    let api = super::create_api(&config)?;
    let transport = Arc::new(TungsteniteTransport::new(config.realtime.max_frame_bytes));
    let manager = SessionManager::new(config, api, transport, InboxEvents::default());

    let session = manager.mount(inbox).await;
    let count_only = args.count_only;
    session.subscribe(move |snapshot| render(snapshot, count_only, format));
    render(&session.snapshot(), count_only, format);
    info!(inbox = %inbox, "Watching inbox; press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::internal(format!("Failed to listen for Ctrl-C: {}", e)))?;

    let metrics = session.metrics();
    manager.shutdown().await;
    output::print_item(&metrics, format);
    Ok(())
}

fn render(snapshot: &StoreSnapshot, count_only: bool, format: OutputFormat) {
    match (format, count_only) {
        (OutputFormat::Json, _) => {
            let unread = if count_only {
                serde_json::Value::Null
            } else {
                serde_json::to_value(&snapshot.unread).unwrap_or_default()
            };
            println!(
                "{}",
                serde_json::json!({
                    "inbox": snapshot.inbox.to_string(),
                    "version": snapshot.version,
                    "unreadCount": snapshot.unread_count,
                    "unread": unread,
                })
            );
        }
        (OutputFormat::Table, true) => {
            println!("{}: {} unread", snapshot.inbox, snapshot.unread_count);
        }
        (OutputFormat::Table, false) => {
            println!(
                "{} · {} unread (v{})",
                snapshot.inbox, snapshot.unread_count, snapshot.version
            );
            let rows: Vec<NotificationRow> = snapshot.unread.iter().map(Into::into).collect();
            output::print_list(&rows, format);
        }
    }
}
