//! Email verification codes.
//!
//! A code is a uniformly random number of `code_digits` digits, zero-padded.
//! Only its BLAKE3 hash is stored. Issuing a code retires every earlier one
//! for the same user, and every way a confirmation can fail produces the same
//! error.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::Rng;
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::{debug, info};

use escrow_store::{StoreError, User};

use crate::config::ServerConfig;
use crate::db::SharedDatabase;
use crate::error::ApiError;
use crate::mailer::{VerificationEmail, VerificationMailer};
use crate::services::accounts::normalize_email;
use crate::views::iso;

#[derive(Debug, Clone)]
pub struct VerificationSettings {
    pub required: bool,
    pub code_digits: u32,
    pub ttl: Duration,
    pub debug_codes: bool,
}

impl VerificationSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            required: config.verification_required,
            code_digits: config.verification_code_digits,
            ttl: Duration::minutes(config.verification_ttl_minutes),
            debug_codes: config.debug_codes,
        }
    }
}

/// A freshly issued code. The plaintext lives only as long as this value.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Body returned by signup and resend while an account awaits verification.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatus {
    pub verification_required: bool,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_code: Option<String>,
}

pub fn generate_code(digits: u32) -> String {
    let upper = 10u64.pow(digits);
    let value = OsRng.gen_range(0..upper);
    format!("{value:0width$}", width = digits as usize)
}

pub fn hash_code(code: &str) -> String {
    blake3::hash(code.as_bytes()).to_hex().to_string()
}

fn hashes_match(stored: &str, candidate: &str) -> bool {
    stored.as_bytes().ct_eq(candidate.as_bytes()).into()
}

fn invalid_code() -> ApiError {
    ApiError::bad_request("Invalid or expired verification code.")
}

pub struct EmailVerification {
    db: SharedDatabase,
    mailer: Arc<dyn VerificationMailer>,
    settings: VerificationSettings,
}

impl EmailVerification {
    pub fn new(
        db: SharedDatabase,
        mailer: Arc<dyn VerificationMailer>,
        settings: VerificationSettings,
    ) -> Self {
        Self {
            db,
            mailer,
            settings,
        }
    }

    pub fn required(&self) -> bool {
        self.settings.required
    }

    /// Retire outstanding codes for `user` and store the hash of a new one.
    pub async fn issue(&self, user: &User) -> Result<IssuedCode, ApiError> {
        let code = generate_code(self.settings.code_digits);
        let code_hash = hash_code(&code);
        let expires_at = Utc::now() + self.settings.ttl;
        let user_id = user.id.clone();

        let token = self
            .db
            .run(move |db| Ok(db.replace_verification_token(&user_id, &code_hash, expires_at)?))
            .await?;

        Ok(IssuedCode {
            code,
            expires_at: token.expires_at,
        })
    }

    /// Issue a code and hand it to the mailer. A delivery failure is returned
    /// to the caller as-is.
    pub async fn issue_and_send(&self, user: &User) -> Result<IssuedCode, ApiError> {
        let issued = self.issue(user).await?;
        self.mailer
            .send_verification_email(&VerificationEmail {
                to: user.email.clone(),
                name: user.name.clone(),
                code: issued.code.clone(),
                expires_at: issued.expires_at,
            })
            .await?;
        info!(user_id = %user.id, mailer = self.mailer.backend(), "Verification code sent");
        Ok(issued)
    }

    /// Consume the newest matching live code and mark the account verified.
    pub async fn confirm(&self, email: &str, code: &str) -> Result<User, ApiError> {
        let email = normalize_email(email);
        let candidate = hash_code(code.trim());

        self.db
            .run(move |db| {
                let Some(user) = db.find_user_by_email(&email)? else {
                    debug!("Verification attempt for unknown email");
                    return Err(invalid_code());
                };

                let tokens = db.active_verification_tokens(&user.id, Utc::now())?;
                let Some(token) = tokens
                    .iter()
                    .find(|token| hashes_match(&token.code_hash, &candidate))
                else {
                    debug!(user_id = %user.id, "Verification code did not match");
                    return Err(invalid_code());
                };

                db.consume_verification_token(token.id, &user.id)
                    .map_err(|e| match e {
                        StoreError::NotFound => invalid_code(),
                        other => other.into(),
                    })
            })
            .await
    }

    /// Send a new code if the account exists and is still unverified.
    ///
    /// Unknown and unverified emails get the same shape back. `debugCode`
    /// is only echoed at signup, never here, so it cannot tell the two apart.
    pub async fn resend(&self, email: &str) -> Result<VerificationStatus, ApiError> {
        let email = normalize_email(email);
        let lookup = email.clone();
        let user = self
            .db
            .run(move |db| Ok(db.find_user_by_email(&lookup)?))
            .await?;

        match user {
            Some(user) if user.email_verified => Ok(VerificationStatus {
                verification_required: false,
                email,
                expires_at: None,
                debug_code: None,
            }),
            Some(user) => {
                let issued = self.issue_and_send(&user).await?;
                Ok(VerificationStatus {
                    debug_code: None,
                    ..self.pending(&user.email, &issued)
                })
            }
            None => {
                debug!("Resend requested for unknown email");
                Ok(VerificationStatus {
                    verification_required: true,
                    email,
                    expires_at: Some(iso(Utc::now() + self.settings.ttl)),
                    debug_code: None,
                })
            }
        }
    }

    pub fn pending(&self, email: &str, issued: &IssuedCode) -> VerificationStatus {
        VerificationStatus {
            verification_required: true,
            email: email.to_string(),
            expires_at: Some(iso(issued.expires_at)),
            debug_code: self
                .settings
                .debug_codes
                .then(|| issued.code.clone()),
        }
    }
}
