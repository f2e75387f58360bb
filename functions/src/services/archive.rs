use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{Event, EventRepository};
use crate::error::AppResult;
use crate::AppState;

/// Unarchived and ended strictly more than `after` before `now`.
pub fn should_archive(event: &Event, now: NaiveDateTime, after: Duration) -> bool {
    !event.is_archived && event.end_time < now - after
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArchivePassReport {
    pub archived: usize,
    pub failed: usize,
}

pub struct ArchiveService {
    pool: SqlitePool,
    after: Duration,
}

impl ArchiveService {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self::from_parts(
            state.db.clone(),
            Duration::days(state.config.sweep.archive_after_days),
        )
    }

    pub fn from_parts(pool: SqlitePool, after: Duration) -> Self {
        Self { pool, after }
    }

    pub async fn run_at(&self, now: NaiveDateTime) -> AppResult<ArchivePassReport> {
        let candidates = EventRepository::list_unarchived(&self.pool).await?;
        let mut report = ArchivePassReport::default();

        for event in candidates
            .iter()
            .filter(|e| should_archive(e, now, self.after))
        {
            match EventRepository::archive(&self.pool, &event.id).await {
                Ok(true) => {
                    report.archived += 1;
                    tracing::info!("Archived event {} (ended {})", event.id, event.end_time);
                }
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("Failed to archive event {}: {:?}", event.id, e);
                }
            }
        }

        Ok(report)
    }
}
