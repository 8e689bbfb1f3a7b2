//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use notisync_core::types::{InboxId, NotificationId, UserId, UserType};

use super::kind::NotificationType;
use super::timestamp;

/// One notification as carried by both the push channel and the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Identity shared by push and poll representations.
    pub id: NotificationId,
    /// Owner of the inbox.
    pub user_id: UserId,
    /// Account type of the owner.
    pub user_type: UserType,
    /// Event kind; drives iconography only.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Display body.
    #[serde(default)]
    pub content: String,
    /// Client copy of the server's read flag.
    #[serde(default)]
    pub is_read: bool,
    /// Back-reference for deep links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<i64>,
    /// Kind of the back-referenced object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_type: Option<String>,
    /// Creation time; orders lists most-recent-first.
    #[serde(
        serialize_with = "timestamp::serialize",
        deserialize_with = "timestamp::deserialize"
    )]
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// Inbox this record belongs to.
    pub fn inbox(&self) -> InboxId {
        InboxId {
            user_id: self.user_id,
            user_type: self.user_type,
        }
    }

    /// Whether the record is unread.
    pub fn is_unread(&self) -> bool {
        !self.is_read
    }

    /// Decode a push frame body.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUSH_BODY: &str = r#"{
        "id": 101,
        "userId": 7,
        "userType": "COMPANY",
        "type": "NEW_APPLICATION",
        "title": "New applicant",
        "content": "Kim applied to Backend Engineer",
        "isRead": false,
        "relatedId": 55,
        "relatedType": "JOB_POSTING",
        "createdAt": "2024-05-01T09:30:00"
    }"#;

    #[test]
    fn test_decodes_push_body() {
        let record = NotificationRecord::from_json(PUSH_BODY).unwrap();
        assert_eq!(record.id, NotificationId(101));
        assert_eq!(record.inbox(), InboxId::new(7, UserType::Company));
        assert_eq!(record.kind, NotificationType::NewApplication);
        assert!(record.is_unread());
        assert_eq!(record.related_id, Some(55));
    }

    #[test]
    fn test_optional_fields_default() {
        let record = NotificationRecord::from_json(
            r#"{"id":1,"userId":2,"userType":"individual","type":"interview-offer","createdAt":"2024-05-01T09:30:00Z"}"#,
        )
        .unwrap();
        assert!(!record.is_read);
        assert!(record.title.is_empty());
        assert!(record.related_type.is_none());
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let err = NotificationRecord::from_json(
            r#"{"userId":2,"userType":"individual","type":"X","createdAt":"2024-05-01T09:30:00Z"}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_serializes_camel_case_rfc3339() {
        let record = NotificationRecord::from_json(PUSH_BODY).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["isRead"], false);
        assert_eq!(json["type"], "NEW_APPLICATION");
        assert_eq!(json["userType"], "company");
        assert_eq!(json["createdAt"], "2024-05-01T09:30:00+00:00");
    }
}
