use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::db::{
    CreateUserProfile, EventRepository, SavedEvent, UserProfile, UserProfileRepository,
};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AdminAuth;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_user))
        .route("/:id/saved-events", post(save_event))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub auth_id: Option<String>,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEventRequest {
    #[serde(alias = "event_id")]
    pub event_id: String,
}

/// Trim the request; a blank auth id is stored as absent.
pub fn validate_user(request: CreateUserRequest) -> AppResult<CreateUserProfile> {
    let name = request.name.trim().to_string();
    let email = request.email.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::Validation(format!("invalid email: {}", email)));
    }

    Ok(CreateUserProfile {
        auth_id: request
            .auth_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
        name,
        email,
    })
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    let profile = validate_user(request)?;
    let user = UserProfileRepository::create(&state.db, profile).await?;
    tracing::info!("Created user profile {}", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

async fn save_event(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(user_id): Path<String>,
    Json(request): Json<SaveEventRequest>,
) -> AppResult<(StatusCode, Json<SavedEvent>)> {
    let event_id = request.event_id.trim();

    UserProfileRepository::find_by_id(&state.db, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
    let event = EventRepository::find_by_id(&state.db, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))?;
    if event.is_archived {
        return Err(AppError::BadRequest(format!(
            "Event {} is archived",
            event.id
        )));
    }

    let saved = UserProfileRepository::save_event(&state.db, &user_id, &event.id)
        .await?;
    tracing::debug!("User {} saved event {}", user_id, event.id);
    Ok((StatusCode::CREATED, Json(saved)))
}
