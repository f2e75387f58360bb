use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{
    Notification, NotificationRepository, NotificationStatus, TargetAudience, UserProfile,
    UserProfileRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::push::{dedupe_message_id, PushMessage, PushSender};
use crate::AppState;

/// Result of dispatching one notification.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub notification_id: String,
    /// Users targeted (recorded on the notification).
    pub recipients: i64,
    /// Pushes accepted by the messaging API during this call.
    pub sent: usize,
    pub failed: usize,
    /// The notification was already `Sent`; nothing was dispatched.
    pub already_sent: bool,
}

/// Counts for the scheduled-notification pass of a sweep.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPassReport {
    pub due: usize,
    pub dispatched: usize,
    pub failed: usize,
    pub pushes_sent: usize,
    pub pushes_failed: usize,
}

/// Sends admin-authored notifications to their target audience.
pub struct NotificationDispatcher {
    pool: SqlitePool,
    push: Arc<dyn PushSender>,
}

impl NotificationDispatcher {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self::from_parts(state.db.clone(), state.push.clone())
    }

    pub fn from_parts(pool: SqlitePool, push: Arc<dyn PushSender>) -> Self {
        Self { pool, push }
    }

    pub async fn dispatch(&self, notification_id: &str) -> AppResult<DispatchOutcome> {
        self.dispatch_at(notification_id, Utc::now().naive_utc())
            .await
    }

    /// Mark the notification `Sent`, then send one push per targeted user.
    ///
    /// A notification that is already `Sent` is never re-dispatched; its stored
    /// recipient count is returned instead. A failed push for one user is logged
    /// and counted and does not stop the batch.
    pub async fn dispatch_at(
        &self,
        notification_id: &str,
        now: NaiveDateTime,
    ) -> AppResult<DispatchOutcome> {
        let notification = NotificationRepository::find_by_id(&self.pool, notification_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Notification {} not found", notification_id))
            })?;

        if notification.status == NotificationStatus::Sent {
            tracing::info!(
                "Notification {} already sent to {} recipient(s); skipping",
                notification.id,
                notification.recipients
            );
            return Ok(DispatchOutcome {
                notification_id: notification.id,
                recipients: notification.recipients,
                sent: 0,
                failed: 0,
                already_sent: true,
            });
        }

        let targets = self.resolve_targets(&notification).await?;
        let recipients = targets.len() as i64;

        // Claim the Sent transition before any push goes out; a concurrent
        // dispatch of the same notification loses here.
        if !NotificationRepository::claim_sent(&self.pool, &notification.id, recipients, now)
            .await?
        {
            let stored = NotificationRepository::find_by_id(&self.pool, &notification.id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Notification {} not found", notification.id))
                })?;
            tracing::info!(
                "Notification {} was claimed by another dispatch; skipping",
                stored.id
            );
            return Ok(DispatchOutcome {
                notification_id: stored.id,
                recipients: stored.recipients,
                sent: 0,
                failed: 0,
                already_sent: true,
            });
        }

        tracing::info!(
            "Dispatching notification {} ({}) to {} user(s)",
            notification.id,
            notification.target_audience.as_str(),
            targets.len()
        );

        let mut sent = 0usize;
        let mut failed = 0usize;

        for user in &targets {
            // resolve_targets only returns users with a push address
            let Some(address) = user.push_address() else {
                continue;
            };

            let message = PushMessage {
                message_id: dedupe_message_id("notification", &notification.id, &user.id),
                title: notification.title.clone(),
                body: notification.message.clone(),
                users: vec![address.to_string()],
                data: Some(serde_json::json!({
                    "type": "announcement",
                    "notificationId": notification.id,
                })),
            };

            match self.push.send_push(&message).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        "Failed to push notification {} to user {}: {}",
                        notification.id,
                        user.id,
                        e
                    );
                }
            }
        }

        tracing::info!(
            "Notification {} sent: recipients={}, sent={}, failed={}",
            notification.id,
            recipients,
            sent,
            failed
        );

        Ok(DispatchOutcome {
            notification_id: notification.id,
            recipients,
            sent,
            failed,
            already_sent: false,
        })
    }

    async fn resolve_targets(&self, notification: &Notification) -> AppResult<Vec<UserProfile>> {
        match notification.target_audience {
            TargetAudience::All => UserProfileRepository::list_reachable(&self.pool).await,
            TargetAudience::Selected => {
                let id = notification.id.as_str();
                let users = UserProfileRepository::list_reachable_targets(&self.pool, id)
                    .await?;
                let selected = NotificationRepository::target_user_ids(&self.pool, id)
                    .await?
                    .len();
                if users.len() < selected {
                    tracing::debug!(
                        "Notification {}: {} of {} selected user(s) have no push address",
                        notification.id,
                        selected - users.len(),
                        selected
                    );
                }
                Ok(users)
            }
        }
    }

    /// Dispatch every `Scheduled` notification whose time has come.
    pub async fn dispatch_due(&self, now: NaiveDateTime) -> AppResult<ScheduledPassReport> {
        let scheduled =
            NotificationRepository::list_by_status(&self.pool, NotificationStatus::Scheduled)
                .await?;

        let mut report = ScheduledPassReport::default();

        for notification in scheduled.into_iter().filter(|n| n.is_due(now)) {
            report.due += 1;
            match self.dispatch_at(&notification.id, now).await {
                Ok(outcome) => {
                    report.dispatched += 1;
                    report.pushes_sent += outcome.sent;
                    report.pushes_failed += outcome.failed;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        "Failed to dispatch scheduled notification {}: {:?}",
                        notification.id,
                        e
                    );
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, CreateNotification, CreateUserProfile};
    use crate::services::push::testing::RecordingPushSender;
    use chrono::Duration;

    async fn user(pool: &SqlitePool, auth_id: Option<&str>) -> UserProfile {
        UserProfileRepository::create(
            pool,
            CreateUserProfile {
                auth_id: auth_id.map(str::to_string),
                name: "user".to_string(),
                email: "user@example.com".to_string(),
            },
        )
        .await
        .unwrap()
    }

    async fn notification(
        pool: &SqlitePool,
        audience: TargetAudience,
        status: NotificationStatus,
        scheduled_at: Option<NaiveDateTime>,
        selected: Vec<String>,
    ) -> Notification {
        NotificationRepository::create(
            pool,
            CreateNotification {
                title: "Festival lineup".to_string(),
                message: "The lineup is out".to_string(),
                target_audience: audience,
                status,
                scheduled_at,
                selected_users: selected,
            },
        )
        .await
        .unwrap()
    }

    async fn draft(pool: &SqlitePool) -> Notification {
        notification(
            pool,
            TargetAudience::All,
            NotificationStatus::Draft,
            None,
            vec![],
        )
        .await
    }

    async fn reload(pool: &SqlitePool, id: &str) -> Notification {
        NotificationRepository::find_by_id(pool, id)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn scheduled_notification_for_all_is_sent_once_per_reachable_user() {
        let pool = test_pool().await;
        user(&pool, Some("auth-a")).await;
        user(&pool, Some("auth-b")).await;
        user(&pool, None).await;
        user(&pool, Some("")).await;

        let now = Utc::now().naive_utc();
        let n1 = notification(
            &pool,
            TargetAudience::All,
            NotificationStatus::Scheduled,
            Some(now - Duration::hours(1)),
            vec![],
        )
        .await;

        let push = Arc::new(RecordingPushSender::default());
        let dispatcher = NotificationDispatcher::from_parts(pool.clone(), push.clone());
        let report = dispatcher.dispatch_due(now).await.unwrap();

        assert_eq!(report.due, 1);
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.pushes_sent, 2);

        let mut users = push.users();
        users.sort();
        assert_eq!(users, vec!["auth-a".to_string(), "auth-b".to_string()]);

        let stored = reload(&pool, &n1.id).await;
        assert_eq!(stored.status, NotificationStatus::Sent);
        assert_eq!(stored.recipients, 2);
        assert_eq!(stored.sent_at, Some(now));
    }

    #[tokio::test]
    async fn resending_a_sent_notification_dispatches_nothing() {
        let pool = test_pool().await;
        user(&pool, Some("auth-a")).await;
        user(&pool, Some("auth-b")).await;
        let n = draft(&pool).await;

        let push = Arc::new(RecordingPushSender::default());
        let dispatcher = NotificationDispatcher::from_parts(pool.clone(), push.clone());

        let first = dispatcher.dispatch(&n.id).await.unwrap();
        assert!(!first.already_sent);
        assert_eq!(first.recipients, 2);

        // A new user appearing later must not change the recorded count.
        user(&pool, Some("auth-c")).await;
        let second = dispatcher.dispatch(&n.id).await.unwrap();
        assert!(second.already_sent);
        assert_eq!(second.recipients, 2);
        assert_eq!(second.sent, 0);
        assert_eq!(push.sent().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_dispatches_push_only_once() {
        let pool = test_pool().await;
        user(&pool, Some("auth-a")).await;
        user(&pool, Some("auth-b")).await;
        user(&pool, Some("auth-c")).await;
        let n = draft(&pool).await;

        let push = Arc::new(RecordingPushSender::default());
        let first = NotificationDispatcher::from_parts(pool.clone(), push.clone());
        let second = NotificationDispatcher::from_parts(pool.clone(), push.clone());

        let (a, b) = tokio::join!(first.dispatch(&n.id), second.dispatch(&n.id));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(push.sent().len(), 3);
        assert!(a.already_sent != b.already_sent);
        assert_eq!(a.recipients, 3);
        assert_eq!(b.recipients, 3);
        assert_eq!(a.sent + b.sent, 3);
    }

    #[tokio::test]
    async fn one_failing_user_does_not_abort_the_batch() {
        let pool = test_pool().await;
        user(&pool, Some("auth-a")).await;
        user(&pool, Some("auth-bad")).await;
        user(&pool, Some("auth-c")).await;
        let n = draft(&pool).await;

        let push = Arc::new(RecordingPushSender::failing_for(&["auth-bad"]));
        let dispatcher = NotificationDispatcher::from_parts(pool.clone(), push.clone());
        let outcome = dispatcher.dispatch(&n.id).await.unwrap();

        assert_eq!(outcome.sent, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.recipients, 3);
        let stored = reload(&pool, &n.id).await;
        assert_eq!(stored.status, NotificationStatus::Sent);
    }

    #[tokio::test]
    async fn selected_audience_only_reaches_selected_users() {
        let pool = test_pool().await;
        let a = user(&pool, Some("auth-a")).await;
        user(&pool, Some("auth-b")).await;
        let no_address = user(&pool, None).await;
        let n = notification(
            &pool,
            TargetAudience::Selected,
            NotificationStatus::Draft,
            None,
            vec![a.id.clone(), no_address.id.clone(), "ghost".to_string()],
        )
        .await;

        let push = Arc::new(RecordingPushSender::default());
        let dispatcher = NotificationDispatcher::from_parts(pool.clone(), push.clone());
        let outcome = dispatcher.dispatch(&n.id).await.unwrap();

        assert_eq!(outcome.recipients, 1);
        assert_eq!(push.users(), vec!["auth-a".to_string()]);
    }

    #[tokio::test]
    async fn future_and_draft_notifications_are_not_due() {
        let pool = test_pool().await;
        user(&pool, Some("auth-a")).await;
        let now = Utc::now().naive_utc();
        let future = notification(
            &pool,
            TargetAudience::All,
            NotificationStatus::Scheduled,
            Some(now + Duration::minutes(5)),
            vec![],
        )
        .await;
        draft(&pool).await;

        let push = Arc::new(RecordingPushSender::default());
        let dispatcher = NotificationDispatcher::from_parts(pool.clone(), push.clone());
        let report = dispatcher.dispatch_due(now).await.unwrap();

        assert_eq!(report, ScheduledPassReport::default());
        assert!(push.sent().is_empty());
        let stored = reload(&pool, &future.id).await;
        assert_eq!(stored.status, NotificationStatus::Scheduled);
    }

    #[tokio::test]
    async fn unknown_notification_is_not_found() {
        let pool = test_pool().await;
        let dispatcher =
            NotificationDispatcher::from_parts(pool, Arc::new(RecordingPushSender::default()));
        assert!(matches!(
            dispatcher.dispatch("missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
