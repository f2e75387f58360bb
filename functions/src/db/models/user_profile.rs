use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    /// Platform auth account the push messaging API addresses.
    /// Profiles without one cannot receive pushes.
    pub auth_id: Option<String>,
    pub name: String,
    pub email: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl UserProfile {
    /// The auth id when it is present and non-blank.
    pub fn push_address(&self) -> Option<&str> {
        self.auth_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// One entry of a user's saved-event list with its reminder flags.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SavedEvent {
    pub user_id: String,
    pub event_id: String,
    pub reminder_24h_sent: bool,
    pub reminder_1h_sent: bool,
    pub saved_at: NaiveDateTime,
}

/// The two reminders a saved event can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    DayBefore,
    HourBefore,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 2] = [ReminderKind::DayBefore, ReminderKind::HourBefore];

    /// How long before the event start the reminder is aimed at.
    pub fn lead(self) -> Duration {
        match self {
            ReminderKind::DayBefore => Duration::hours(24),
            ReminderKind::HourBefore => Duration::hours(1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReminderKind::DayBefore => "reminder_24h",
            ReminderKind::HourBefore => "reminder_1h",
        }
    }

    /// Whether this reminder was already delivered for the saved entry.
    pub fn is_flagged(self, saved: &SavedEvent) -> bool {
        match self {
            ReminderKind::DayBefore => saved.reminder_24h_sent,
            ReminderKind::HourBefore => saved.reminder_1h_sent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserProfile {
    pub auth_id: Option<String>,
    pub name: String,
    pub email: String,
}
