//! Notification type tag.
//!
//! The tag only selects iconography; merge logic never branches on it.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Kind of event a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    /// A candidate applied to one of the company's postings.
    NewApplication,
    /// A saved or applied posting closes soon.
    DeadlineApproaching,
    /// A company offered an interview.
    InterviewOffer,
    /// A candidate accepted an interview.
    InterviewAccepted,
    /// A candidate rejected an interview.
    InterviewRejected,
    /// A company offered a position.
    PositionOffer,
    /// An application moved to a new status.
    ApplicationStatus,
    /// Any tag this client does not know yet.
    Other,
}

impl NotificationType {
    /// Canonical wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewApplication => "NEW_APPLICATION",
            Self::DeadlineApproaching => "DEADLINE_APPROACHING",
            Self::InterviewOffer => "INTERVIEW_OFFER",
            Self::InterviewAccepted => "INTERVIEW_ACCEPTED",
            Self::InterviewRejected => "INTERVIEW_REJECTED",
            Self::PositionOffer => "POSITION_OFFER",
            Self::ApplicationStatus => "APPLICATION_STATUS",
            Self::Other => "OTHER",
        }
    }

    /// Parse a wire tag; accepts `SCREAMING_SNAKE`, `kebab-case` and `snake_case`.
    pub fn from_wire(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "NEW_APPLICATION" => Self::NewApplication,
            "DEADLINE_APPROACHING" => Self::DeadlineApproaching,
            "INTERVIEW_OFFER" => Self::InterviewOffer,
            "INTERVIEW_ACCEPTED" => Self::InterviewAccepted,
            "INTERVIEW_REJECTED" => Self::InterviewRejected,
            "POSITION_OFFER" => Self::PositionOffer,
            "APPLICATION_STATUS" => Self::ApplicationStatus,
            _ => Self::Other,
        }
    }

    /// Short glyph used by terminal consumers.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::NewApplication => "📥",
            Self::DeadlineApproaching => "⏰",
            Self::InterviewOffer => "📅",
            Self::InterviewAccepted => "✅",
            Self::InterviewRejected => "❌",
            Self::PositionOffer => "🎉",
            Self::ApplicationStatus => "📄",
            Self::Other => "🔔",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NotificationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NotificationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_all_spellings() {
        assert_eq!(
            NotificationType::from_wire("interview-accepted"),
            NotificationType::InterviewAccepted
        );
        assert_eq!(
            NotificationType::from_wire("position_offer"),
            NotificationType::PositionOffer
        );
        assert_eq!(
            NotificationType::from_wire("NEW_APPLICATION"),
            NotificationType::NewApplication
        );
    }

    #[test]
    fn test_unknown_tag_is_other() {
        let t: NotificationType = serde_json::from_str("\"CREDIT_LOW\"").unwrap();
        assert_eq!(t, NotificationType::Other);
    }
}
