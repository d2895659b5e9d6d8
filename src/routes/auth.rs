use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::db::Member;
use crate::error::AppError;
use crate::services::auth::AuthService;
use crate::AppState;

// ============================================================================
// Auth Extractor
// ============================================================================

/// Extractor for the authenticated family member
pub struct AuthUser(pub Member);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Extract Authorization header (Bearer token)
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
        if token.is_empty() {
            tracing::debug!("Empty bearer token in Authorization header");
            return Err(AppError::Unauthorized);
        }

        let member = AuthService::get_member_from_token(state, token)
            .await
            .map_err(|e| {
                tracing::debug!("Failed to get member from token: {:?}", e);
                e
            })?;

        tracing::debug!("Authenticated member: {}", member.id);
        Ok(AuthUser(member))
    }
}
