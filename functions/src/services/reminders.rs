//! Saved-event reminders.
//!
//! A reminder of kind `k` for an event starting at `start` is due when `now`
//! lies within `window` of `start - k.lead()`, boundaries included, and the
//! saved entry has not been flagged for `k` yet.
//!
//! The flag is claimed with a conditional update *before* the push goes out and
//! released again if the push fails, so a crash between the two steps can drop a
//! reminder but never duplicate one. The push also carries a deterministic
//! message id, letting the messaging platform reject replays.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{
    Event, EventRepository, ReminderKind, SavedEvent, UserProfile, UserProfileRepository,
};
use crate::error::AppResult;
use crate::services::push::{dedupe_message_id, PushMessage, PushSender};
use crate::AppState;

/// Whether `now` falls inside the reminder window of `kind` for an event starting at `start`.
pub fn reminder_due(
    start: NaiveDateTime,
    now: NaiveDateTime,
    kind: ReminderKind,
    window: Duration,
) -> bool {
    let target = start - kind.lead();
    now >= target - window && now <= target + window
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPassReport {
    /// Saved entries inspected.
    pub checked: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct ReminderService {
    pool: SqlitePool,
    push: Arc<dyn PushSender>,
    window: Duration,
}

impl ReminderService {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self::from_parts(
            state.db.clone(),
            state.push.clone(),
            Duration::minutes(state.config.sweep.reminder_window_minutes),
        )
    }

    pub fn from_parts(pool: SqlitePool, push: Arc<dyn PushSender>, window: Duration) -> Self {
        Self { pool, push, window }
    }

    /// Scan every user's saved events and push the reminders that are due at `now`.
    pub async fn run_at(&self, now: NaiveDateTime) -> AppResult<ReminderPassReport> {
        let events: HashMap<String, Event> = EventRepository::list_all(&self.pool)
            .await?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();
        let users: HashMap<String, UserProfile> = UserProfileRepository::list_all(&self.pool)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let saved_events = UserProfileRepository::list_saved_events(&self.pool).await?;

        tracing::debug!(
            "Reminder pass: {} event(s), {} user(s), {} saved entr(ies)",
            events.len(),
            users.len(),
            saved_events.len()
        );

        let mut report = ReminderPassReport::default();

        for saved in &saved_events {
            report.checked += 1;

            let Some(user) = users.get(&saved.user_id) else {
                continue;
            };
            let Some(address) = user.push_address() else {
                continue;
            };
            let Some(event) = events.get(&saved.event_id) else {
                tracing::debug!(
                    "User {} saved unknown event {}; skipping",
                    saved.user_id,
                    saved.event_id
                );
                continue;
            };
            if event.is_archived {
                continue;
            }

            for kind in ReminderKind::ALL {
                if kind.is_flagged(saved) || !reminder_due(event.start_time, now, kind, self.window)
                {
                    continue;
                }

                match self.remind(saved, address, event, kind).await {
                    Ok(true) => report.sent += 1,
                    Ok(false) => {}
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(
                            "Failed to send {} for event {} to user {}: {}",
                            kind.as_str(),
                            event.id,
                            saved.user_id,
                            e
                        );
                    }
                }
            }
        }

        Ok(report)
    }

    /// Claim the flag, push, and release the claim if the push fails.
    /// Returns `Ok(false)` when another run already claimed it.
    async fn remind(
        &self,
        saved: &SavedEvent,
        address: &str,
        event: &Event,
        kind: ReminderKind,
    ) -> AppResult<bool> {
        let claimed =
            UserProfileRepository::claim_reminder(&self.pool, &saved.user_id, &saved.event_id, kind)
                .await?;
        if !claimed {
            return Ok(false);
        }

        let message = reminder_message(saved, address, event, kind);
        if let Err(e) = self.push.send_push(&message).await {
            if let Err(release_err) = UserProfileRepository::release_reminder(
                &self.pool,
                &saved.user_id,
                &saved.event_id,
                kind,
            )
            .await
            {
                tracing::warn!(
                    "Could not release {} flag for user {} / event {}: {:?}",
                    kind.as_str(),
                    saved.user_id,
                    saved.event_id,
                    release_err
                );
            }
            return Err(e);
        }

        tracing::info!(
            "Sent {} for event {} to user {}",
            kind.as_str(),
            event.id,
            saved.user_id
        );
        Ok(true)
    }
}

fn reminder_message(
    saved: &SavedEvent,
    address: &str,
    event: &Event,
    kind: ReminderKind,
) -> PushMessage {
    let body = match kind {
        ReminderKind::DayBefore => format!("{} starts in 24 hours. Don't miss it!", event.title),
        ReminderKind::HourBefore => format!("{} starts in 1 hour. Get ready!", event.title),
    };

    PushMessage {
        message_id: dedupe_message_id(kind.as_str(), &event.id, &saved.user_id),
        title: "Upcoming event".to_string(),
        body,
        users: vec![address.to_string()],
        data: Some(serde_json::json!({
            "type": "event_reminder",
            "reminder": kind.as_str(),
            "eventId": event.id,
        })),
    }
}
