use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Client (brand) Repository
// ============================================================================

pub struct ClientRepository;

impl ClientRepository {
    pub async fn create(pool: &SqlitePool, name: &str) -> AppResult<Client> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (id, name, created_at)
            VALUES (?, ?, ?)
            RETURNING id, name, created_at
            "#,
        )
        .bind(id)
        .bind(name.trim())
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Case-insensitive lookup by brand name; surrounding whitespace is ignored.
    pub async fn find_by_name(pool: &SqlitePool, name: &str) -> AppResult<Option<Client>> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT id, name, created_at
            FROM clients
            WHERE LOWER(TRIM(name)) = LOWER(TRIM(?))
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }
}

// ============================================================================
// Category Repository
// ============================================================================

pub struct CategoryRepository;

impl CategoryRepository {
    pub async fn create(pool: &SqlitePool, name: &str) -> AppResult<Category> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, name, created_at)
            VALUES (?, ?, ?)
            RETURNING id, name, created_at
            "#,
        )
        .bind(id)
        .bind(name.trim())
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_name(pool: &SqlitePool, name: &str) -> AppResult<Option<Category>> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, created_at
            FROM categories
            WHERE LOWER(TRIM(name)) = LOWER(TRIM(?))
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn lookups_ignore_case_and_padding() {
        let pool = test_pool().await;
        let client = ClientRepository::create(&pool, "Blue Note").await.unwrap();
        let category = CategoryRepository::create(&pool, "Jazz").await.unwrap();

        let found = ClientRepository::find_by_name(&pool, "  blue NOTE ")
            .await
            .unwrap();
        assert_eq!(found.map(|c| c.id), Some(client.id));

        let found = CategoryRepository::find_by_name(&pool, "jazz")
            .await
            .unwrap();
        assert_eq!(found.map(|c| c.id), Some(category.id));

        let missing = ClientRepository::find_by_name(&pool, "Red Note")
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
