use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

use crate::db::{Category, CategoryRepository, Client, ClientRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AdminAuth;
use crate::AppState;

/// Brands that imported events are attached to.
pub fn clients_router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(create_client))
}

pub fn categories_router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(create_category))
}

#[derive(Debug, Deserialize)]
pub struct CreateNamedRequest {
    pub name: String,
}

fn required_name(request: &CreateNamedRequest) -> AppResult<&str> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    Ok(name)
}

async fn create_client(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Json(request): Json<CreateNamedRequest>,
) -> AppResult<(StatusCode, Json<Client>)> {
    let name = required_name(&request)?;
    if ClientRepository::find_by_name(&state.db, name)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest(format!(
            "Client '{}' already exists",
            name
        )));
    }

    let client = ClientRepository::create(&state.db, name).await?;
    tracing::info!("Created client {} ({})", client.id, client.name);
    Ok((StatusCode::CREATED, Json(client)))
}

async fn create_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Json(request): Json<CreateNamedRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let name = required_name(&request)?;
    if CategoryRepository::find_by_name(&state.db, name)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest(format!(
            "Category '{}' already exists",
            name
        )));
    }

    let category = CategoryRepository::create(&state.db, name).await?;
    tracing::info!("Created category {} ({})", category.id, category.name);
    Ok((StatusCode::CREATED, Json(category)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{body_json, test_state};
    use axum::body::Body;
    use http::Request;
    use tower::ServiceExt;

    fn create(name: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::json!({ "name": name }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn creates_clients_once_per_name() {
        let (state, _push) = test_state(None).await;
        let app = clients_router().with_state(state.clone());

        let resp = app.clone().oneshot(create(" Blue Note ")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = body_json(resp).await;
        assert_eq!(json["name"], "Blue Note");

        let found = ClientRepository::find_by_name(&state.db, "blue note")
            .await
            .unwrap();
        assert!(found.is_some());

        let resp = app.clone().oneshot(create("BLUE NOTE")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app.oneshot(create("   ")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn creates_categories() {
        let (state, _push) = test_state(Some("key")).await;
        let app = categories_router().with_state(state.clone());

        let resp = app.clone().oneshot(create("Jazz")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let mut request = create("Jazz");
        request.headers_mut().insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_static("Bearer key"),
        );
        let resp = app.oneshot(request).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let found = CategoryRepository::find_by_name(&state.db, "jazz")
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
