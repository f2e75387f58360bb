use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Event Repository
// ============================================================================

pub struct EventRepository;

impl EventRepository {
    pub async fn create(pool: &SqlitePool, event: CreateEvent) -> AppResult<Event> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (
                id, title, description, client_id, category_id, location,
                start_time, end_time, price, ticket_url, image_url,
                is_archived, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING
                id, title, description, client_id, category_id, location,
                start_time, end_time, price, ticket_url, image_url,
                is_archived, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(event.title)
        .bind(event.description)
        .bind(event.client_id)
        .bind(event.category_id)
        .bind(event.location)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.price)
        .bind(event.ticket_url)
        .bind(event.image_url)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Event>> {
        sqlx::query_as::<_, Event>(
            r#"
            SELECT
                id, title, description, client_id, category_id, location,
                start_time, end_time, price, ticket_url, image_url,
                is_archived, created_at, updated_at
            FROM events
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_all(pool: &SqlitePool) -> AppResult<Vec<Event>> {
        sqlx::query_as::<_, Event>(
            r#"
            SELECT
                id, title, description, client_id, category_id, location,
                start_time, end_time, price, ticket_url, image_url,
                is_archived, created_at, updated_at
            FROM events
            ORDER BY start_time ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_unarchived(pool: &SqlitePool) -> AppResult<Vec<Event>> {
        sqlx::query_as::<_, Event>(
            r#"
            SELECT
                id, title, description, client_id, category_id, location,
                start_time, end_time, price, ticket_url, image_url,
                is_archived, created_at, updated_at
            FROM events
            WHERE is_archived = 0
            ORDER BY end_time ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Flag an event archived. Returns `false` if it was already archived or is gone.
    pub async fn archive(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE events
            SET is_archived = 1, updated_at = ?
            WHERE id = ? AND is_archived = 0
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }
}
