//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section; every field has a default so a partial file is valid.

pub mod api;
pub mod inbox;
pub mod logging;
pub mod polling;
pub mod realtime;
pub mod store;

use serde::{Deserialize, Serialize};

use self::api::ApiConfig;
use self::inbox::InboxConfig;
use self::logging::LoggingConfig;
use self::polling::PollingConfig;
use self::realtime::RealtimeConfig;
use self::store::StoreConfig;

use crate::error::AppError;
use crate::types::{InboxId, UserType};

/// Prefix of environment variables overriding file values, e.g.
/// `NOTISYNC__POLLING__INTERVAL_SECONDS=10`.
const ENV_PREFIX: &str = "NOTISYNC";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// REST backend settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Push channel settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Polling refresher settings.
    #[serde(default)]
    pub polling: PollingConfig,
    /// Store limits.
    #[serde(default)]
    pub store: StoreConfig,
    /// Default inbox identity.
    #[serde(default)]
    pub inbox: InboxConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file overlaid with `NOTISYNC__*`
    /// environment variables. A missing file yields the defaults.
    pub fn load(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Parse configuration from TOML text, without environment overlay.
    pub fn from_toml_str(toml: &str) -> Result<Self, AppError> {
        let parsed: Self = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject values that would make the synchronization core misbehave.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.api.request_timeout_ms == 0 || self.polling.request_timeout_ms == 0 {
            return Err(AppError::configuration(
                "Request timeouts must be greater than zero",
            ));
        }
        if self.realtime.connect_timeout_ms == 0 {
            return Err(AppError::configuration(
                "realtime.connect_timeout_ms must be greater than zero",
            ));
        }
        if self.realtime.reconnect_base_delay_ms > self.realtime.reconnect_max_delay_ms {
            return Err(AppError::configuration(
                "realtime.reconnect_base_delay_ms exceeds realtime.reconnect_max_delay_ms",
            ));
        }
        let grace = self.realtime.heartbeat_grace_factor;
        if !grace.is_finite() || grace < 1.0 {
            return Err(AppError::configuration(
                "realtime.heartbeat_grace_factor must be a finite number of at least 1.0",
            ));
        }
        if self.realtime.frame_buffer_size == 0 {
            return Err(AppError::configuration(
                "realtime.frame_buffer_size must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Inbox configured in the `[inbox]` section, if both fields are set.
    pub fn default_inbox(&self) -> Result<Option<InboxId>, AppError> {
        match (self.inbox.user_id, self.inbox.user_type.as_deref()) {
            (Some(user_id), Some(user_type)) => {
                let user_type: UserType = user_type.parse()?;
                Ok(Some(InboxId::new(user_id, user_type)))
            }
            _ => Ok(None),
        }
    }
}
