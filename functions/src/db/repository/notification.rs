use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

/// Repository for admin-authored push notifications and their selected users.
pub struct NotificationRepository;

impl NotificationRepository {
    /// Insert a notification together with its selected-user list.
    pub async fn create(
        pool: &SqlitePool,
        notification: CreateNotification,
    ) -> AppResult<Notification> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        let row = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (
                id, title, message, target_audience, status,
                scheduled_at, sent_at, recipients, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, NULL, 0, ?, ?)
            RETURNING
                id, title, message, target_audience, status,
                scheduled_at, sent_at, recipients, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(notification.title)
        .bind(notification.message)
        .bind(notification.target_audience.as_str())
        .bind(notification.status.as_str())
        .bind(notification.scheduled_at)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        if notification.target_audience == TargetAudience::Selected {
            for user_id in &notification.selected_users {
                sqlx::query(
                    r#"
                    INSERT INTO notification_targets (notification_id, user_id)
                    VALUES (?, ?)
                    ON CONFLICT (notification_id, user_id) DO NOTHING
                    "#,
                )
                .bind(&id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;
            }
        }

        tx.commit().await.map_err(AppError::Database)?;
        Ok(row)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Notification>> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT
                id, title, message, target_audience, status,
                scheduled_at, sent_at, recipients, created_at, updated_at
            FROM notifications
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_by_status(
        pool: &SqlitePool,
        status: NotificationStatus,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT
                id, title, message, target_audience, status,
                scheduled_at, sent_at, recipients, created_at, updated_at
            FROM notifications
            WHERE status = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Page through notifications, newest first, optionally filtered by status.
    pub async fn list(
        pool: &SqlitePool,
        status: Option<NotificationStatus>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Notification>> {
        let status = status.map(NotificationStatus::as_str);

        sqlx::query_as::<_, Notification>(
            r#"
            SELECT
                id, title, message, target_audience, status,
                scheduled_at, sent_at, recipients, created_at, updated_at
            FROM notifications
            WHERE (? IS NULL OR status = ?)
            ORDER BY created_at DESC
            LIMIT ?
            OFFSET ?
            "#,
        )
        .bind(status)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn count(pool: &SqlitePool, status: Option<NotificationStatus>) -> AppResult<i64> {
        let status = status.map(NotificationStatus::as_str);

        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE (? IS NULL OR status = ?)",
        )
        .bind(status)
        .bind(status)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn target_user_ids(pool: &SqlitePool, id: &str) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM notification_targets WHERE notification_id = ? ORDER BY user_id",
        )
        .bind(id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Transition to `Sent` and record how many users were targeted.
    ///
    /// Only one caller can win: returns `false` when the notification was
    /// already `Sent` (or does not exist).
    pub async fn claim_sent(
        pool: &SqlitePool,
        id: &str,
        recipients: i64,
        sent_at: NaiveDateTime,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = 'Sent', sent_at = ?, recipients = ?, updated_at = ?
            WHERE id = ? AND status <> 'Sent'
            "#,
        )
        .bind(sent_at)
        .bind(recipients)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }
}
