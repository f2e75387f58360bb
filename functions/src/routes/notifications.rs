use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{
    CreateNotification, Notification, NotificationRepository, NotificationStatus, TargetAudience,
};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AdminAuth;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications).post(create_notification))
        .route("/:id", get(get_notification))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub title: String,
    pub message: String,
    pub target_audience: Option<String>,
    pub status: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub selected_users: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotificationsListResponse {
    pub items: Vec<NotificationResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    pub title: String,
    pub message: String,
    pub target_audience: TargetAudience,
    pub status: NotificationStatus,
    pub scheduled_at: Option<NaiveDateTime>,
    pub sent_at: Option<NaiveDateTime>,
    pub recipients: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_users: Option<Vec<String>>,
    pub created_at: NaiveDateTime,
}

impl NotificationResponse {
    fn new(n: Notification, selected_users: Option<Vec<String>>) -> Self {
        Self {
            id: n.id,
            title: n.title,
            message: n.message,
            target_audience: n.target_audience,
            status: n.status,
            scheduled_at: n.scheduled_at,
            sent_at: n.sent_at,
            recipients: n.recipients,
            selected_users,
            created_at: n.created_at,
        }
    }
}

/// Check a create request and turn it into a repository insert.
pub fn validate_create(request: CreateNotificationRequest) -> AppResult<CreateNotification> {
    let title = request.title.trim().to_string();
    let message = request.message.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }
    if message.is_empty() {
        return Err(AppError::Validation(
            "message must not be empty".to_string(),
        ));
    }

    let target_audience = match request.target_audience.as_deref() {
        None => TargetAudience::All,
        Some(raw) => TargetAudience::from_str(raw.trim()).ok_or_else(|| {
            AppError::Validation(format!("unknown target audience: {}", raw))
        })?,
    };

    let status = match request.status.as_deref() {
        None if request.scheduled_at.is_some() => NotificationStatus::Scheduled,
        None => NotificationStatus::Draft,
        Some(raw) => NotificationStatus::from_str(raw.trim())
            .ok_or_else(|| AppError::Validation(format!("unknown status: {}", raw)))?,
    };

    if status == NotificationStatus::Sent {
        return Err(AppError::Validation(
            "a notification cannot be created as Sent".to_string(),
        ));
    }

    let scheduled_at = request.scheduled_at.map(|at| at.naive_utc());
    if status == NotificationStatus::Scheduled && scheduled_at.is_none() {
        return Err(AppError::Validation(
            "scheduledAt is required for Scheduled notifications".to_string(),
        ));
    }

    let mut selected_users: Vec<String> = request
        .selected_users
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();
    selected_users.sort();
    selected_users.dedup();

    if target_audience == TargetAudience::Selected && selected_users.is_empty() {
        return Err(AppError::Validation(
            "selectedUsers must name at least one user".to_string(),
        ));
    }
    if target_audience == TargetAudience::All {
        selected_users.clear();
    }

    Ok(CreateNotification {
        title,
        message,
        target_audience,
        status,
        scheduled_at,
        selected_users,
    })
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_notification(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Json(request): Json<CreateNotificationRequest>,
) -> AppResult<(StatusCode, Json<NotificationResponse>)> {
    let create = validate_create(request)?;
    let selected = (create.target_audience == TargetAudience::Selected)
        .then(|| create.selected_users.clone());

    let notification = NotificationRepository::create(&state.db, create).await?;
    tracing::info!(
        "Created notification {} ({}, {})",
        notification.id,
        notification.status.as_str(),
        notification.target_audience.as_str()
    );

    Ok((
        StatusCode::CREATED,
        Json(NotificationResponse::new(notification, selected)),
    ))
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<Json<NotificationsListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1).saturating_mul(per_page);

    let status = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let status = match status {
        None => None,
        Some(raw) => Some(
            NotificationStatus::from_str(raw)
                .ok_or_else(|| AppError::BadRequest(format!("unknown status: {}", raw)))?,
        ),
    };

    let notifications = NotificationRepository::list(&state.db, status, per_page, offset)
        .await?;
    let total = NotificationRepository::count(&state.db, status).await?;
    let total_pages = (total as f64 / per_page as f64).ceil() as i64;

    Ok(Json(NotificationsListResponse {
        items: notifications
            .into_iter()
            .map(|n| NotificationResponse::new(n, None))
            .collect(),
        total,
        page,
        per_page,
        total_pages,
    }))
}

async fn get_notification(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(id): Path<String>,
) -> AppResult<Json<NotificationResponse>> {
    let notification = NotificationRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;

    let selected = match notification.target_audience {
        TargetAudience::Selected => {
            let ids = NotificationRepository::target_user_ids(&state.db, &notification.id)
                .await?;
            Some(ids)
        }
        TargetAudience::All => None,
    };

    Ok(Json(NotificationResponse::new(notification, selected)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{body_json, test_state};
    use axum::body::Body;
    use http::Request;
    use tower::ServiceExt;

    fn request(title: &str, message: &str) -> CreateNotificationRequest {
        CreateNotificationRequest {
            title: title.to_string(),
            message: message.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_to_draft_for_everyone() {
        let create = validate_create(request(" Hi ", "There")).unwrap();
        assert_eq!(create.title, "Hi");
        assert_eq!(create.status, NotificationStatus::Draft);
        assert_eq!(create.target_audience, TargetAudience::All);
    }

    #[test]
    fn scheduled_at_implies_scheduled() {
        let mut req = request("Hi", "There");
        req.scheduled_at = Some(Utc::now());
        assert_eq!(
            validate_create(req).unwrap().status,
            NotificationStatus::Scheduled
        );
    }

    #[test]
    fn rejects_invalid_requests() {
        assert!(validate_create(request("", "body")).is_err());
        assert!(validate_create(request("title", "   ")).is_err());

        let mut req = request("t", "m");
        req.status = Some("Scheduled".to_string());
        assert!(validate_create(req).is_err());

        let mut req = request("t", "m");
        req.status = Some("sent".to_string());
        assert!(validate_create(req).is_err());

        let mut req = request("t", "m");
        req.target_audience = Some("Selected".to_string());
        req.selected_users = vec!["  ".to_string()];
        assert!(matches!(validate_create(req), Err(AppError::Validation(_))));
    }

    #[test]
    fn selected_users_are_deduplicated() {
        let mut req = request("t", "m");
        req.target_audience = Some("selected".to_string());
        req.selected_users = vec!["u2".to_string(), "u1".to_string(), "u2".to_string()];
        let create = validate_create(req).unwrap();
        assert_eq!(create.selected_users, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn create_list_and_fetch() {
        let (state, _push) = test_state(Some("key")).await;
        let app = router().with_state(state);

        let body = serde_json::json!({
            "title": "Lineup",
            "message": "Announced",
            "targetAudience": "Selected",
            "selectedUsers": ["u1"],
        });
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(http::header::AUTHORIZATION, "Bearer key")
                    .header(http::header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = body_json(resp).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["status"], "Draft");

        let get = |uri: String| {
            Request::builder()
                .uri(uri)
                .header(http::header::AUTHORIZATION, "Bearer key")
                .body(Body::empty())
                .unwrap()
        };

        let resp = app.clone().oneshot(get(format!("/{}", id))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let fetched = body_json(resp).await;
        assert_eq!(fetched["selectedUsers"][0], "u1");

        let resp = app
            .clone()
            .oneshot(get("/?status=draft&per_page=10".to_string()))
            .await
            .unwrap();
        let list = body_json(resp).await;
        assert_eq!(list["total"], 1);
        assert_eq!(list["total_pages"], 1);
        assert_eq!(list["items"][0]["id"], id.as_str());

        let resp = app.oneshot(get("/nope".to_string())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn huge_page_numbers_return_an_empty_page() {
        let (state, _push) = test_state(None).await;
        let app = router().with_state(state);

        let uri = format!("/?page={}&per_page=100", i64::MAX);
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let list = body_json(resp).await;
        assert_eq!(list["items"], serde_json::json!([]));
        assert_eq!(list["page"], i64::MAX);
    }
}
