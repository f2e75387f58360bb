use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, thiserror::Error)]
#[error("Invalid {kind}: {value}")]
pub struct InvalidVariant {
    kind: &'static str,
    value: String,
}

/// Lifecycle of an admin-authored push notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationStatus {
    Draft,
    Scheduled,
    Sent,
}

impl NotificationStatus {
    /// Convert from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(NotificationStatus::Draft),
            "scheduled" => Some(NotificationStatus::Scheduled),
            "sent" => Some(NotificationStatus::Sent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationStatus::Draft => "Draft",
            NotificationStatus::Scheduled => "Scheduled",
            NotificationStatus::Sent => "Sent",
        }
    }
}

impl TryFrom<String> for NotificationStatus {
    type Error = InvalidVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value).ok_or(InvalidVariant {
            kind: "notification status",
            value,
        })
    }
}

/// Recipient-selection mode of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetAudience {
    All,
    Selected,
}

impl TargetAudience {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "all" => Some(TargetAudience::All),
            "selected" => Some(TargetAudience::Selected),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetAudience::All => "All",
            TargetAudience::Selected => "Selected",
        }
    }
}

impl TryFrom<String> for TargetAudience {
    type Error = InvalidVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value).ok_or(InvalidVariant {
            kind: "target audience",
            value,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[sqlx(try_from = "String")]
    pub target_audience: TargetAudience,
    #[sqlx(try_from = "String")]
    pub status: NotificationStatus,
    pub scheduled_at: Option<NaiveDateTime>,
    pub sent_at: Option<NaiveDateTime>,
    /// Number of users targeted when the notification was sent.
    pub recipients: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Notification {
    /// Scheduled and due at `now` (inclusive).
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.status == NotificationStatus::Scheduled
            && self.scheduled_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotification {
    pub title: String,
    pub message: String,
    pub target_audience: TargetAudience,
    pub status: NotificationStatus,
    pub scheduled_at: Option<NaiveDateTime>,
    /// Profile ids, only meaningful for `TargetAudience::Selected`.
    pub selected_users: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn notification(status: NotificationStatus, at: Option<NaiveDateTime>) -> Notification {
        let now = Utc::now().naive_utc();
        Notification {
            id: "n1".to_string(),
            title: "Title".to_string(),
            message: "Body".to_string(),
            target_audience: TargetAudience::All,
            status,
            scheduled_at: at,
            sent_at: None,
            recipients: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_parses_case_insensitively() {
        use super::NotificationStatus::*;

        assert_eq!(NotificationStatus::from_str("scheduled"), Some(Scheduled));
        assert_eq!(NotificationStatus::from_str("SENT"), Some(Sent));
        assert!(NotificationStatus::try_from("queued".to_string()).is_err());
        assert_eq!(
            TargetAudience::from_str("Selected"),
            Some(TargetAudience::Selected)
        );
    }

    #[test]
    fn due_only_when_scheduled_in_the_past_or_now() {
        use super::NotificationStatus::*;

        let now = Utc::now().naive_utc();
        let hour_ago = Some(now - Duration::hours(1));
        let soon = Some(now + Duration::seconds(1));

        assert!(notification(Scheduled, Some(now)).is_due(now));
        assert!(notification(Scheduled, hour_ago).is_due(now));
        assert!(!notification(Scheduled, soon).is_due(now));
        assert!(!notification(Scheduled, None).is_due(now));
        assert!(!notification(Sent, hour_ago).is_due(now));
        assert!(!notification(Draft, hour_ago).is_due(now));
    }
}
