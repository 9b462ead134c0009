use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Response, Json};
use tracing::info;

use crate::api::AppState;
use crate::auth::{issue_session, AuthResponse};
use crate::error::ApiError;
use crate::services::verification::VerificationStatus;
use crate::validation::{
    LoginRequest, Payload, ResendVerificationRequest, SignupRequest, VerifyEmailRequest,
};

/// `POST /api/auth/signup`
///
/// With verification on, the account starts unverified and the response
/// carries the pending-verification payload instead of a token.
pub async fn signup(
    State(state): State<AppState>,
    Payload(body): Payload<SignupRequest>,
) -> Result<Response, ApiError> {
    body.validate()?;

    let required = state.verification.required();
    let user = state
        .accounts
        .create_account(&body.name, &body.email, &body.password, !required)
        .await?;

    if required {
        let issued = state.verification.issue_and_send(&user).await?;
        let status = state.verification.pending(&user.email, &issued);
        return Ok((StatusCode::CREATED, Json(status)).into_response());
    }

    Ok((StatusCode::CREATED, Json(issue_session(&state, &user))).into_response())
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Payload(body): Payload<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    body.validate()?;

    let user = state.accounts.authenticate(&body.email, &body.password).await?;
    if state.verification.required() && !user.email_verified {
        return Err(ApiError::Authentication(
            "Please verify your email before signing in.".to_string(),
        ));
    }

    info!(user_id = %user.id, "Login succeeded");
    Ok(Json(issue_session(&state, &user)))
}

/// `POST /api/auth/verify-email`
pub async fn verify_email(
    State(state): State<AppState>,
    Payload(body): Payload<VerifyEmailRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    body.validate()?;

    let user = state.verification.confirm(&body.email, &body.code).await?;
    Ok(Json(issue_session(&state, &user)))
}

/// `POST /api/auth/resend-verification`
pub async fn resend_verification(
    State(state): State<AppState>,
    Payload(body): Payload<ResendVerificationRequest>,
) -> Result<Json<VerificationStatus>, ApiError> {
    body.validate()?;

    Ok(Json(state.verification.resend(&body.email).await?))
}
