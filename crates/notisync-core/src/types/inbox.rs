//! Inbox identity: which (user, account type) pair a client instance serves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::UserId;
use crate::error::AppError;

/// Account type owning an inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    /// A job seeker.
    #[serde(alias = "INDIVIDUAL", alias = "Individual")]
    Individual,
    /// A hiring company.
    #[serde(alias = "COMPANY", alias = "Company")]
    Company,
}

impl UserType {
    /// Path segment used by topics and REST routes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Company => "company",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "individual" => Ok(Self::Individual),
            "company" => Ok(Self::Company),
            other => Err(AppError::validation(format!(
                "Unknown user type '{other}' (expected 'individual' or 'company')"
            ))),
        }
    }
}

/// The (userId, userType) pair identifying one notification inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InboxId {
    /// Owner of the inbox.
    pub user_id: UserId,
    /// Account type of the owner.
    pub user_type: UserType,
}

impl InboxId {
    /// Create a new inbox identity.
    pub fn new(user_id: i64, user_type: UserType) -> Self {
        Self {
            user_id: UserId(user_id),
            user_type,
        }
    }

    /// Push-channel topic identity: `notifications/{userType}/{userId}`.
    pub fn topic(&self) -> String {
        format!("notifications/{}/{}", self.user_type, self.user_id)
    }

    /// REST path prefix shared by the inbox-scoped endpoints.
    pub fn rest_path(&self) -> String {
        format!("/notifications/{}/{}", self.user_type, self.user_id)
    }
}

impl fmt::Display for InboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_type, self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_and_rest_path() {
        let inbox = InboxId::new(42, UserType::Company);
        assert_eq!(inbox.topic(), "notifications/company/42");
        assert_eq!(inbox.rest_path(), "/notifications/company/42");
        assert_eq!(inbox.to_string(), "company:42");
    }

    #[test]
    fn test_user_type_parsing() {
        assert_eq!("INDIVIDUAL".parse::<UserType>().unwrap(), UserType::Individual);
        assert_eq!(" company".parse::<UserType>().unwrap(), UserType::Company);
        assert!("admin".parse::<UserType>().is_err());
    }

    #[test]
    fn test_user_type_accepts_upper_case_on_the_wire() {
        let t: UserType = serde_json::from_str("\"COMPANY\"").unwrap();
        assert_eq!(t, UserType::Company);
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"company\"");
    }
}
