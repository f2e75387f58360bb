use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};

use crate::error::AppErrorWithDetails;
use crate::routes::auth::AdminAuth;
use crate::services::importer::{EventImporter, ImportReport};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/import", post(import_events))
}

/// Import events from a raw CSV body. Row failures are reported, not fatal.
async fn import_events(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    body: String,
) -> Result<Json<ImportReport>, AppErrorWithDetails> {
    tracing::debug!("Received CSV upload ({} bytes)", body.len());
    let report = EventImporter::new(&state).import(&body).await?;
    Ok(Json(report))
}
