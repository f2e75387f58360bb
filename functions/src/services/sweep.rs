use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;

use crate::services::archive::{ArchivePassReport, ArchiveService};
use crate::services::notifications::{NotificationDispatcher, ScheduledPassReport};
use crate::services::reminders::{ReminderPassReport, ReminderService};
use crate::AppState;

/// Outcome of one sweep. A pass that could not run is `None` and its error is listed.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub success: bool,
    pub scheduled: Option<ScheduledPassReport>,
    pub reminders: Option<ReminderPassReport>,
    pub archive: Option<ArchivePassReport>,
    pub errors: Vec<String>,
}

/// Runs the scheduled-notification, reminder and archive passes in that order.
pub struct Sweep {
    dispatcher: NotificationDispatcher,
    reminders: ReminderService,
    archive: ArchiveService,
}

impl Sweep {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self::from_parts(
            NotificationDispatcher::new(state),
            ReminderService::new(state),
            ArchiveService::new(state),
        )
    }

    pub fn from_parts(
        dispatcher: NotificationDispatcher,
        reminders: ReminderService,
        archive: ArchiveService,
    ) -> Self {
        Self {
            dispatcher,
            reminders,
            archive,
        }
    }

    pub async fn run(&self) -> SweepReport {
        self.run_at(Utc::now().naive_utc()).await
    }

    /// Each pass runs even when an earlier one failed.
    pub async fn run_at(&self, now: NaiveDateTime) -> SweepReport {
        let mut report = SweepReport::default();

        match self.dispatcher.dispatch_due(now).await {
            Ok(r) => report.scheduled = Some(r),
            Err(e) => {
                tracing::warn!("Scheduled notification pass failed: {:?}", e);
                report.errors.push(format!("scheduled notifications: {}", e));
            }
        }

        match self.reminders.run_at(now).await {
            Ok(r) => report.reminders = Some(r),
            Err(e) => {
                tracing::warn!("Reminder pass failed: {:?}", e);
                report.errors.push(format!("reminders: {}", e));
            }
        }

        match self.archive.run_at(now).await {
            Ok(r) => report.archive = Some(r),
            Err(e) => {
                tracing::warn!("Archive pass failed: {:?}", e);
                report.errors.push(format!("archive: {}", e));
            }
        }

        report.success = report.errors.is_empty();
        tracing::info!(
            "Sweep finished: scheduled={:?} reminders={:?} archive={:?} errors={}",
            report.scheduled,
            report.reminders,
            report.archive,
            report.errors.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        test_pool, ClientRepository, CreateEvent, CreateNotification, CreateUserProfile,
        EventRepository, NotificationRepository, NotificationStatus, TargetAudience,
        UserProfileRepository,
    };
    use crate::services::push::testing::RecordingPushSender;
    use chrono::Duration;

    #[tokio::test]
    async fn sweep_runs_all_three_passes() {
        let pool = test_pool().await;
        let now = Utc::now().naive_utc();

        let user = UserProfileRepository::create(
            &pool,
            CreateUserProfile {
                auth_id: Some("auth-1".to_string()),
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
            },
        )
        .await
        .unwrap();

        let client = ClientRepository::create(&pool, "Brand").await.unwrap();
        let new_event = |start: NaiveDateTime| CreateEvent {
            title: "Gig".to_string(),
            description: String::new(),
            client_id: client.id.clone(),
            category_id: None,
            location: String::new(),
            start_time: start,
            end_time: start + Duration::hours(2),
            price: None,
            ticket_url: None,
            image_url: None,
        };
        let upcoming = EventRepository::create(&pool, new_event(now + Duration::hours(24)))
            .await
            .unwrap();
        EventRepository::create(&pool, new_event(now - Duration::days(10)))
            .await
            .unwrap();
        UserProfileRepository::save_event(&pool, &user.id, &upcoming.id)
            .await
            .unwrap();

        NotificationRepository::create(
            &pool,
            CreateNotification {
                title: "Hello".to_string(),
                message: "World".to_string(),
                target_audience: TargetAudience::All,
                status: NotificationStatus::Scheduled,
                scheduled_at: Some(now - Duration::minutes(1)),
                selected_users: vec![],
            },
        )
        .await
        .unwrap();

        let push = Arc::new(RecordingPushSender::default());
        let sweep = Sweep::from_parts(
            NotificationDispatcher::from_parts(pool.clone(), push.clone()),
            ReminderService::from_parts(pool.clone(), push.clone(), Duration::minutes(15)),
            ArchiveService::from_parts(pool.clone(), Duration::days(7)),
        );

        let report = sweep.run_at(now).await;
        assert!(report.success);
        assert_eq!(report.scheduled.as_ref().unwrap().dispatched, 1);
        assert_eq!(report.reminders.as_ref().unwrap().sent, 1);
        assert_eq!(report.archive.as_ref().unwrap().archived, 1);
        assert_eq!(push.sent().len(), 2);

        // Nothing left to do on an immediate re-run.
        let again = sweep.run_at(now).await;
        assert_eq!(again.scheduled.unwrap().due, 0);
        assert_eq!(again.reminders.unwrap().sent, 0);
        assert_eq!(again.archive.unwrap().archived, 0);
        assert_eq!(push.sent().len(), 2);
    }

    #[tokio::test]
    async fn failing_pass_does_not_stop_the_others() {
        let pool = test_pool().await;
        let push = Arc::new(RecordingPushSender::default());
        let sweep = Sweep::from_parts(
            NotificationDispatcher::from_parts(pool.clone(), push.clone()),
            ReminderService::from_parts(pool.clone(), push.clone(), Duration::minutes(15)),
            ArchiveService::from_parts(pool.clone(), Duration::days(7)),
        );

        sqlx::query("DROP TABLE notification_targets")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("DROP TABLE notifications")
            .execute(&pool)
            .await
            .unwrap();

        let report = sweep.run().await;
        assert!(!report.success);
        assert!(report.scheduled.is_none());
        assert_eq!(report.errors.len(), 1);
        assert!(report.reminders.is_some());
        assert!(report.archive.is_some());
    }
}
