use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::AppState;

/// Extractor guarding dashboard-facing endpoints with the shared admin key.
///
/// Expects `Authorization: Bearer <ADMIN_API_KEY>`. When no key is configured
/// every request passes.
pub struct AdminAuth;

fn keys_match(presented: &str, expected: &str) -> bool {
    // Compare fixed-size digests so the comparison does not leak the key length.
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin.api_key.as_deref() else {
            return Ok(AdminAuth);
        };

        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        if !auth_header.to_ascii_lowercase().starts_with("bearer ") {
            tracing::debug!("Authorization header doesn't start with 'Bearer '");
            return Err(AppError::Unauthorized);
        }

        let token = auth_header[7..].trim();
        if token.is_empty() || !keys_match(token, expected) {
            tracing::debug!("Rejected admin request with invalid bearer token");
            return Err(AppError::Unauthorized);
        }

        Ok(AdminAuth)
    }
}
