use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::routes::auth::AdminAuth;
use crate::services::notifications::{DispatchOutcome, NotificationDispatcher};
use crate::services::sweep::{Sweep, SweepReport};
use crate::AppState;

/// Function endpoints: on-demand dispatch and the sweep entry point.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", axum::routing::get(run_sweep).post(run_sweep))
        .route("/send-notification", post(send_notification))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationRequest {
    #[serde(alias = "notification_id")]
    pub notification_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendNotificationResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

async fn send_notification(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Json(request): Json<SendNotificationRequest>,
) -> AppResult<Json<SendNotificationResponse>> {
    let notification_id = request
        .notification_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("notificationId is required".to_string()))?;

    let outcome = NotificationDispatcher::new(&state)
        .dispatch(&notification_id)
        .await?;

    Ok(Json(SendNotificationResponse {
        success: true,
        outcome,
    }))
}

async fn run_sweep(State(state): State<Arc<AppState>>, _admin: AdminAuth) -> Json<SweepReport> {
    tracing::info!("Sweep triggered over HTTP");
    Json(Sweep::new(&state).run().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        CreateNotification, CreateUserProfile, NotificationRepository, NotificationStatus,
        TargetAudience, UserProfileRepository,
    };
    use crate::routes::test_support::{body_json, test_state};
    use axum::body::Body;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn send_notification_dispatches_once() {
        let (state, push) = test_state(None).await;
        for (i, auth_id) in [Some("a-1"), Some("a-2"), None].into_iter().enumerate() {
            UserProfileRepository::create(
                &state.db,
                CreateUserProfile {
                    auth_id: auth_id.map(str::to_string),
                    name: format!("User {}", i),
                    email: format!("u{}@example.com", i),
                },
            )
            .await
            .unwrap();
        }
        let notification = NotificationRepository::create(
            &state.db,
            CreateNotification {
                title: "Doors open".to_string(),
                message: "See you there".to_string(),
                target_audience: TargetAudience::All,
                status: NotificationStatus::Draft,
                scheduled_at: None,
                selected_users: vec![],
            },
        )
        .await
        .unwrap();

        let app = router().with_state(state.clone());
        let body = serde_json::json!({ "notificationId": notification.id });

        let resp = app
            .clone()
            .oneshot(post_json("/send-notification", body.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["recipients"], 2);
        assert_eq!(json["sent"], 2);
        assert_eq!(json["alreadySent"], false);

        let resp = app
            .oneshot(post_json("/send-notification", body))
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["alreadySent"], true);
        assert_eq!(json["recipients"], 2);
        assert_eq!(push.sent().len(), 2);
    }

    #[tokio::test]
    async fn send_notification_validates_input() {
        let (state, _push) = test_state(None).await;
        let app = router().with_state(state);

        let resp = app
            .clone()
            .oneshot(post_json("/send-notification", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(post_json(
                "/send-notification",
                serde_json::json!({ "notificationId": "missing" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn sweep_endpoint_requires_admin_key_when_configured() {
        let (state, _push) = test_state(Some("s3cret")).await;
        let app = router().with_state(state);

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(http::header::AUTHORIZATION, "Bearer s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["scheduled"]["due"], 0);
        assert_eq!(json["archive"]["archived"], 0);
    }
}
