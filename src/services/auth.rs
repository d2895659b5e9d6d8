use std::sync::Arc;

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::db::{Member, MemberRepository};
use crate::error::{AppError, AppResult};
use crate::AppState;

/// Bearer token claims. Tokens are issued by the account service with the
/// shared `JWT_SECRET`; this service only verifies them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthService;

impl AuthService {
    /// Decode and validate a JWT, returning the claims
    pub fn decode_jwt(state: &Arc<AppState>, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Resolve the member a token was issued for. A valid token for a
    /// member that no longer exists is treated as unauthenticated.
    pub async fn get_member_from_token(state: &Arc<AppState>, token: &str) -> AppResult<Member> {
        let claims = Self::decode_jwt(state, token)?;
        let member = MemberRepository::find_by_id(&state.db, &claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;
        Ok(member)
    }
}
