use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use super::{errors::AppError, AppState};

/// A request carrying a live session token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
    pub token: Uuid,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AppError::Unauthorized)?;

        let username = state
            .sessions
            .username(token)
            .await
            .ok_or(AppError::Unauthorized)?;

        Ok(Self { username, token })
    }
}

fn bearer_token(header: &str) -> Option<Uuid> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Uuid::parse_str(token.trim()).ok()
}
