use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Profile Repository
// ============================================================================

pub struct UserProfileRepository;

impl UserProfileRepository {
    pub async fn create(pool: &SqlitePool, profile: CreateUserProfile) -> AppResult<UserProfile> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO user_profiles (id, auth_id, name, email, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, auth_id, name, email, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(profile.auth_id)
        .bind(profile.name)
        .bind(profile.email)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<UserProfile>> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, auth_id, name, email, created_at, updated_at
            FROM user_profiles
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_all(pool: &SqlitePool) -> AppResult<Vec<UserProfile>> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, auth_id, name, email, created_at, updated_at
            FROM user_profiles
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Every profile that can receive a push (non-blank `auth_id`).
    pub async fn list_reachable(pool: &SqlitePool) -> AppResult<Vec<UserProfile>> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, auth_id, name, email, created_at, updated_at
            FROM user_profiles
            WHERE auth_id IS NOT NULL AND TRIM(auth_id) <> ''
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// The reachable profiles among a notification's explicitly selected users.
    pub async fn list_reachable_targets(
        pool: &SqlitePool,
        notification_id: &str,
    ) -> AppResult<Vec<UserProfile>> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT u.id, u.auth_id, u.name, u.email, u.created_at, u.updated_at
            FROM user_profiles u
            JOIN notification_targets t ON t.user_id = u.id
            WHERE t.notification_id = ?
              AND u.auth_id IS NOT NULL AND TRIM(u.auth_id) <> ''
            ORDER BY u.created_at ASC
            "#,
        )
        .bind(notification_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Add an event to a user's saved list. Saving twice keeps the existing flags.
    pub async fn save_event(
        pool: &SqlitePool,
        user_id: &str,
        event_id: &str,
    ) -> AppResult<SavedEvent> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO saved_events (
                user_id, event_id, reminder_24h_sent, reminder_1h_sent, saved_at
            ) VALUES (?, ?, 0, 0, ?)
            ON CONFLICT (user_id, event_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Self::find_saved_event(pool, user_id, event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Saved event {} not found", event_id)))
    }

    pub async fn find_saved_event(
        pool: &SqlitePool,
        user_id: &str,
        event_id: &str,
    ) -> AppResult<Option<SavedEvent>> {
        sqlx::query_as::<_, SavedEvent>(
            r#"
            SELECT user_id, event_id, reminder_24h_sent, reminder_1h_sent, saved_at
            FROM saved_events
            WHERE user_id = ? AND event_id = ?
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_saved_events(pool: &SqlitePool) -> AppResult<Vec<SavedEvent>> {
        sqlx::query_as::<_, SavedEvent>(
            r#"
            SELECT user_id, event_id, reminder_24h_sent, reminder_1h_sent, saved_at
            FROM saved_events
            ORDER BY user_id, saved_at ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Atomically set a reminder flag that is still unset.
    ///
    /// Returns `false` when the flag was already set (or the entry is gone), in
    /// which case the caller must not send the reminder.
    pub async fn claim_reminder(
        pool: &SqlitePool,
        user_id: &str,
        event_id: &str,
        kind: ReminderKind,
    ) -> AppResult<bool> {
        let query = match kind {
            ReminderKind::DayBefore => {
                "UPDATE saved_events SET reminder_24h_sent = 1 \
                 WHERE user_id = ? AND event_id = ? AND reminder_24h_sent = 0"
            }
            ReminderKind::HourBefore => {
                "UPDATE saved_events SET reminder_1h_sent = 1 \
                 WHERE user_id = ? AND event_id = ? AND reminder_1h_sent = 0"
            }
        };

        let result = sqlx::query(query)
            .bind(user_id)
            .bind(event_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Undo a claim after the push could not be delivered.
    pub async fn release_reminder(
        pool: &SqlitePool,
        user_id: &str,
        event_id: &str,
        kind: ReminderKind,
    ) -> AppResult<()> {
        let query = match kind {
            ReminderKind::DayBefore => {
                "UPDATE saved_events SET reminder_24h_sent = 0 WHERE user_id = ? AND event_id = ?"
            }
            ReminderKind::HourBefore => {
                "UPDATE saved_events SET reminder_1h_sent = 0 WHERE user_id = ? AND event_id = ?"
            }
        };

        sqlx::query(query)
            .bind(user_id)
            .bind(event_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
