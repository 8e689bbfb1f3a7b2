//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use notisync_core::config::AppConfig;
use notisync_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = redacted(super::load_config(config_path).await?);
            output::print_item(&config, format);
        }
        ConfigCommand::Validate => match super::load_config(config_path).await {
            Ok(config) => {
                output::print_success(&format!("Configuration '{}' is valid", config_path));
                output::print_field("API", &config.api.base_url);
                output::print_field(
                    "Push channel",
                    if config.realtime.enabled {
                        config.realtime.endpoint.as_str()
                    } else {
                        "disabled"
                    },
                );
                output::print_field(
                    "Polling",
                    &if config.polling.enabled {
                        format!("every {}s", config.polling.interval_seconds)
                    } else {
                        "disabled".to_string()
                    },
                );
                match config.default_inbox() {
                    Ok(Some(inbox)) => output::print_field("Inbox", &inbox.to_string()),
                    Ok(None) => output::print_warning("No default inbox configured"),
                    Err(e) => {
                        output::print_error(&format!("Configuration invalid: {}", e));
                        return Err(e);
                    }
                }
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}

/// Hide the bearer token before display.
fn redacted(mut config: AppConfig) -> AppConfig {
    if config.api.auth_token.is_some() {
        config.api.auth_token = Some("****".to_string());
    }
    config
}
