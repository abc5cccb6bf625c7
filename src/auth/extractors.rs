use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::TokenError;
use crate::{error::AppError, state::AppState, users::repo_types::Role};

/// Caller resolved from a valid bearer token whose subject is still active.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

fn bearer(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Invalid Authorization header"))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer(parts)?;

        let payload = state.tokens.validate(token).map_err(|e| {
            warn!(error = %e, "rejected bearer token");
            match e {
                TokenError::Expired => AppError::unauthorized("Token expired"),
                _ => AppError::unauthorized("Invalid token"),
            }
        })?;

        // the subject may have been deleted since the token was issued
        let user = match state.users.find_one(payload.sub).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                warn!(user_id = %payload.sub, "token subject no longer exists");
                return Err(AppError::unauthorized("Invalid token"));
            }
            Err(e) => return Err(e),
        };

        Ok(AuthUser {
            id: user.id,
            email: user.email,
            role: user.role,
        })
    }
}
