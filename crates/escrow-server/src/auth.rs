//! Bearer-token authentication for the dashboard routes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::debug;

use escrow_store::User;

use crate::api::AppState;
use crate::error::ApiError;
use crate::views::UserView;

/// The account behind a valid bearer token.
pub struct AuthUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(ApiError::unauthorized)?;

        let claims = state.sessions.verify(token).map_err(|e| {
            debug!(error = %e, "Rejected bearer token");
            ApiError::unauthorized()
        })?;

        // A token for an account that no longer exists is just as invalid.
        match state.accounts.get(&claims.user_id).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(ApiError::NotFound(_)) => Err(ApiError::Authentication("User not found.".to_string())),
            Err(other) => Err(other),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

/// Sign a session for `user` valid for the configured lifetime.
pub fn issue_session(state: &AppState, user: &User) -> AuthResponse {
    let valid_until = Utc::now() + Duration::hours(state.config.session_ttl_hours);
    AuthResponse {
        token: state.sessions.issue(&user.id, &user.email, valid_until),
        user: UserView::from(user),
    }
}
