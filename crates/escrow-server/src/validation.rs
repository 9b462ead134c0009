//! Request payloads and their checks.
//!
//! Every problem found in a payload is reported at once as a list of
//! `{path, message}` issues under a single 400.

use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use escrow_shared::constants::MAX_AMOUNT_CENTS;
use escrow_shared::currency::{dollars_to_cents, format_currency_from_cents};

use crate::error::{ApiError, FieldIssue};
use crate::services::dashboard::EscrowDraft;

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "12345678",
    "123456789",
    "qwerty123",
    "letmein123",
    "welcome123",
];

/// `Json<T>` whose rejection is reported like any other validation failure.
pub struct Payload<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::invalid_payload(vec![FieldIssue::new(
                "",
                rejection.body_text(),
            )])),
        }
    }
}

/// Collects issues, then fails once with all of them.
#[derive(Default)]
struct Issues(Vec<FieldIssue>);

impl Issues {
    fn check(&mut self, ok: bool, path: &str, message: &str) {
        if !ok {
            self.0.push(FieldIssue::new(path, message));
        }
    }

    fn finish(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::invalid_payload(self.0))
        }
    }
}

/// Syntactic email check: one `@`, a non-empty local part and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

fn check_email(issues: &mut Issues, email: &str) {
    issues.check(is_valid_email(email), "email", "Invalid email address.");
}

fn check_strong_password(issues: &mut Issues, password: &str) {
    issues.check(
        password.chars().count() >= 12,
        "password",
        "Password must be at least 12 characters long.",
    );
    issues.check(
        password.chars().any(|c| c.is_ascii_uppercase()),
        "password",
        "Password must include at least one uppercase letter.",
    );
    issues.check(
        password.chars().any(|c| c.is_ascii_lowercase()),
        "password",
        "Password must include at least one lowercase letter.",
    );
    issues.check(
        password.chars().any(|c| c.is_ascii_digit()),
        "password",
        "Password must include at least one number.",
    );
    issues.check(
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
        "password",
        "Password must include at least one symbol.",
    );
    issues.check(
        !COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()),
        "password",
        "Password is too common. Pick something more unique.",
    );
}

fn positive_cents(issues: &mut Issues, amount: f64) -> i64 {
    match dollars_to_cents(amount) {
        Ok(cents) if cents > MAX_AMOUNT_CENTS => {
            issues.check(
                false,
                "amount",
                &format!(
                    "Amount must be at most {}.",
                    format_currency_from_cents(MAX_AMOUNT_CENTS)
                ),
            );
            0
        }
        Ok(cents) if amount > 0.0 && cents > 0 => cents,
        Ok(_) => {
            issues.check(false, "amount", "Amount must be at least 0.01.");
            0
        }
        Err(e) => {
            issues.check(false, "amount", &e.to_string());
            0
        }
    }
}

// ---------------------------------------------------------------------------
// Auth payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut issues = Issues::default();
        let name_len = self.name.trim().chars().count();
        issues.check(
            (2..=80).contains(&name_len),
            "name",
            "Name must be between 2 and 80 characters.",
        );
        check_email(&mut issues, &self.email);
        check_strong_password(&mut issues, &self.password);
        issues.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut issues = Issues::default();
        check_email(&mut issues, &self.email);
        issues.check(
            self.password.chars().count() >= 8,
            "password",
            "Password must be at least 8 characters long.",
        );
        issues.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

impl VerifyEmailRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut issues = Issues::default();
        check_email(&mut issues, &self.email);
        let code = self.code.trim();
        issues.check(
            !code.is_empty() && code.len() <= 12 && code.chars().all(|c| c.is_ascii_digit()),
            "code",
            "Verification code must be numeric.",
        );
        issues.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

impl ResendVerificationRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut issues = Issues::default();
        check_email(&mut issues, &self.email);
        issues.finish()
    }
}

// ---------------------------------------------------------------------------
// Dashboard payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateEscrowRequest {
    pub title: String,
    pub counterpart: String,
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateEscrowRequest {
    pub fn validate(self) -> Result<EscrowDraft, ApiError> {
        let mut issues = Issues::default();
        let title = self.title.trim().to_string();
        let counterpart = self.counterpart.trim().to_string();

        issues.check(
            title.chars().count() >= 2,
            "title",
            "Title must be at least 2 characters.",
        );
        issues.check(
            counterpart.chars().count() >= 2,
            "counterpart",
            "Counterpart must be at least 2 characters.",
        );
        let amount_cents = positive_cents(&mut issues, self.amount);
        issues.finish()?;

        Ok(EscrowDraft {
            title,
            counterpart,
            amount_cents,
            category: non_blank(self.category),
            description: non_blank(self.description),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct WalletRequest {
    pub amount: f64,
}

impl WalletRequest {
    /// The requested amount in cents, strictly positive.
    pub fn amount_cents(&self) -> Result<i64, ApiError> {
        let mut issues = Issues::default();
        let cents = positive_cents(&mut issues, self.amount);
        issues.finish()?;
        Ok(cents)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
