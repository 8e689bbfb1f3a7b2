//! Default inbox identity.

use serde::{Deserialize, Serialize};

/// Inbox the agent serves when none is given on the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboxConfig {
    /// Backend user id.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// `individual` or `company`.
    #[serde(default)]
    pub user_type: Option<String>,
}
