//! One-shot notification commands against the REST API.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use super::Commands;
use crate::output::{self, OutputFormat};
use notisync_core::error::AppError;
use notisync_core::types::{InboxId, NotificationId};
use notisync_entity::NotificationRecord;
use notisync_service::NotificationApi;

/// Notification display row
#[derive(Debug, Serialize, Tabled)]
pub(crate) struct NotificationRow {
    /// Notification ID
    id: i64,
    /// Type
    #[tabled(rename = "type")]
    kind: String,
    /// Title
    title: String,
    /// Created
    created: String,
    /// Read
    read: String,
}

impl From<&NotificationRecord> for NotificationRow {
    fn from(record: &NotificationRecord) -> Self {
        Self {
            id: record.id.get(),
            kind: format!("{} {}", record.kind.icon(), record.kind.as_str()),
            title: record.title.clone(),
            created: record.created_at.format("%Y-%m-%d %H:%M").to_string(),
            read: if record.is_read { "✓" } else { "✗" }.to_string(),
        }
    }
}

/// Count display
#[derive(Debug, Serialize)]
struct CountView {
    inbox: String,
    unread: u64,
}

/// Execute a one-shot notification command
pub async fn execute(
    command: &Commands,
    api: Arc<dyn NotificationApi>,
    inbox: InboxId,
    format: OutputFormat,
) -> Result<(), AppError> {
    match command {
        Commands::Unread => {
            let mut records = api.unread(inbox).await?;
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            match format {
                OutputFormat::Json => output::print_item(&records, format),
                OutputFormat::Table => {
                    let rows: Vec<NotificationRow> = records.iter().map(Into::into).collect();
                    output::print_list(&rows, format);
                }
            }
        }
        Commands::Count => {
            let unread = api.unread_count(inbox).await?;
            match format {
                OutputFormat::Json => output::print_item(
                    &CountView {
                        inbox: inbox.to_string(),
                        unread,
                    },
                    format,
                ),
                OutputFormat::Table => println!("Unread notifications: {}", unread),
            }
        }
        Commands::Read { id } => {
            api.mark_read(NotificationId(*id)).await?;
            output::print_success(&format!("Notification {} marked read", id));
        }
        Commands::ReadAll => {
            api.mark_all_read(inbox).await?;
            output::print_success(&format!("All notifications in {} marked read", inbox));
        }
        Commands::Delete { id } => {
            api.delete(NotificationId(*id)).await?;
            output::print_success(&format!("Notification {} deleted", id));
        }
        Commands::Config(_) | Commands::Watch(_) => {
            return Err(AppError::internal("Command is not a one-shot notification command"));
        }
    }

    Ok(())
}
