//! REST backend configuration.

use serde::{Deserialize, Serialize};

/// Settings for the notification REST API consumed by the poller and the
/// read-state coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the backend, e.g. `https://api.example.com/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Timeout applied to every acknowledgement and one-shot request, in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Bearer token sent as `Authorization` header, if any.
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout(),
            auth_token: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_request_timeout() -> u64 {
    5_000
}
