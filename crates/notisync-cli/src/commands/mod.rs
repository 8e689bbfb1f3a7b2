//! CLI command definitions and dispatch.

pub mod config;
pub mod notification;
pub mod watch;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use notisync_core::config::AppConfig;
use notisync_core::error::AppError;
use notisync_core::types::{InboxId, UserType};
use notisync_http::HttpNotificationApi;

/// NotiSync — notification inbox client for the recruiting platform
#[derive(Debug, Parser)]
#[command(name = "notisync", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Inbox owner id (overrides `[inbox] user_id`)
    #[arg(long, global = true)]
    pub user_id: Option<i64>,

    /// Inbox owner type, `individual` or `company` (overrides `[inbox] user_type`)
    #[arg(long, global = true)]
    pub user_type: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List unread notifications
    Unread,
    /// Show the server's unread count
    Count,
    /// Mark one notification read
    Read {
        /// Notification ID
        id: i64,
    },
    /// Mark every notification in the inbox read
    ReadAll,
    /// Delete a notification
    Delete {
        /// Notification ID
        id: i64,
    },
    /// Configuration management
    Config(config::ConfigArgs),
    /// Follow the inbox live until Ctrl-C
    Watch(watch::WatchArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Config(args) => config::execute(args, &self.config, self.format).await,
            Commands::Watch(args) => {
                let config = load_config(&self.config).await?;
                let inbox = self.inbox(&config)?;
                watch::execute(args, config, inbox, self.format).await
            }
            command => {
                let config = load_config(&self.config).await?;
                let inbox = self.inbox(&config)?;
                let api = create_api(&config)?;
                notification::execute(command, api, inbox, self.format).await
            }
        }
    }

    /// Inbox from the command line, falling back to the config file.
    fn inbox(&self, config: &AppConfig) -> Result<InboxId, AppError> {
        resolve_inbox(self.user_id, self.user_type.as_deref(), config)
    }
}

/// Helper: load configuration from file
pub async fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
}

/// Helper: build the REST client from config
pub fn create_api(config: &AppConfig) -> Result<Arc<HttpNotificationApi>, AppError> {
    Ok(Arc::new(HttpNotificationApi::new(&config.api)?))
}

/// Combine command-line overrides with the `[inbox]` section.
pub fn resolve_inbox(
    user_id: Option<i64>,
    user_type: Option<&str>,
    config: &AppConfig,
) -> Result<InboxId, AppError> {
    let configured = config.default_inbox()?;
    let user_id = user_id.or(configured.map(|i| i.user_id.get()));
    let user_type = match user_type {
        Some(raw) => Some(raw.parse::<UserType>()?),
        None => configured.map(|i| i.user_type),
    };
    match (user_id, user_type) {
        (Some(user_id), Some(user_type)) => Ok(InboxId::new(user_id, user_type)),
        _ => Err(AppError::validation(
            "No inbox given; pass --user-id and --user-type or set [inbox] in the config",
        )),
    }
}
