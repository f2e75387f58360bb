use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(response))
}

#[derive(Serialize)]
pub struct PingResponse {
    pub success: bool,
    pub message: &'static str,
    pub timestamp: String,
}

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        success: true,
        message: "pong",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
