use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use escrow_shared::error::CurrencyError;
use escrow_store::StoreError;

use crate::mailer::MailerError;

/// One field-level problem in a request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Every failure a handler can return. Each variant has exactly one status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        issues: Vec<FieldIssue>,
    },

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Insufficient wallet balance.")]
    InsufficientFunds,

    #[error("Failed to send verification email.")]
    Delivery(#[source] MailerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// A 400 with a single message and no field detail.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            issues: Vec::new(),
        }
    }

    pub fn invalid_payload(issues: Vec<FieldIssue>) -> Self {
        Self::Validation {
            message: "Invalid request payload.".to_string(),
            issues,
        }
    }

    pub fn unauthorized() -> Self {
        Self::Authentication("Unauthorized".to_string())
    }

    /// Map a store error, naming the missing record on `NotFound`.
    pub fn from_store(err: StoreError, missing: &str) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound(missing.to_string()),
            other => other.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::InsufficientFunds => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Delivery(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("Not found.".to_string()),
            StoreError::DuplicateEmail => {
                ApiError::Conflict("An account with this email already exists.".to_string())
            }
            StoreError::InsufficientFunds { .. } => ApiError::InsufficientFunds,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MailerError> for ApiError {
    fn from(err: MailerError) -> Self {
        ApiError::Delivery(err)
    }
}

impl From<CurrencyError> for ApiError {
    fn from(err: CurrencyError) -> Self {
        ApiError::invalid_payload(vec![FieldIssue::new("amount", err.to_string())])
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "no_issues")]
    issues: &'a [FieldIssue],
}

fn no_issues(issues: &&[FieldIssue]) -> bool {
    issues.is_empty()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                "Internal server error".to_string()
            }
            ApiError::Delivery(source) => {
                tracing::error!(error = %source, "Verification email delivery failed");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let issues: &[FieldIssue] = match &self {
            ApiError::Validation { issues, .. } => issues.as_slice(),
            _ => &[],
        };

        let body = ErrorBody {
            error: &message,
            issues,
        };

        (status, axum::Json(body)).into_response()
    }
}
