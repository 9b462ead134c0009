//! Outbound verification email.
//!
//! Delivery is a single synchronous attempt made while the signup or resend
//! request is in flight. A failure surfaces to the caller; nothing is queued
//! or retried.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const SUBJECT: &str = "Verify your MyEscrow account";

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Email API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Email API error {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// One verification message. `code` is the plaintext code and must not be
/// persisted anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationEmail {
    pub to: String,
    pub name: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait VerificationMailer: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn send_verification_email(&self, email: &VerificationEmail) -> Result<(), MailerError>;
}

/// Pick the Resend mailer when an API key is configured, otherwise log only.
pub fn from_config(config: &ServerConfig) -> Arc<dyn VerificationMailer> {
    match &config.resend_api_key {
        Some(api_key) => Arc::new(ResendMailer::new(
            api_key.clone(),
            config.email_from.clone(),
            config.app_url.clone(),
        )),
        None => Arc::new(LogMailer),
    }
}

/// Development mailer: the code only ever reaches the server log.
#[derive(Debug)]
pub struct LogMailer;

#[async_trait]
impl VerificationMailer for LogMailer {
    fn backend(&self) -> &'static str {
        "log"
    }

    async fn send_verification_email(&self, email: &VerificationEmail) -> Result<(), MailerError> {
        warn!(
            to = %email.to,
            "RESEND_API_KEY not set; verification email not sent externally"
        );
        debug!(to = %email.to, code = %email.code, "Verification code for development");
        Ok(())
    }
}

/// Sends through the Resend HTTP API.
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
    app_url: String,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: String,
    text: String,
    reply_to: &'a str,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String, app_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
            app_url,
        }
    }

    fn verify_link(&self) -> String {
        format!("{}/verify-email", self.app_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl VerificationMailer for ResendMailer {
    fn backend(&self) -> &'static str {
        "resend"
    }

    async fn send_verification_email(&self, email: &VerificationEmail) -> Result<(), MailerError> {
        let link = self.verify_link();
        let body = ResendRequest {
            from: &self.from,
            to: &email.to,
            subject: SUBJECT,
            html: render_html(email, &link),
            text: render_text(email, &link),
            reply_to: &self.from,
        };

        let resp = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!(to = %email.to, status = status.as_u16(), body = %text, "Resend rejected verification email");
            return Err(MailerError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        info!(to = %email.to, "Verification email sent");
        Ok(())
    }
}

fn minutes_left(expires_at: DateTime<Utc>) -> i64 {
    (expires_at - Utc::now()).num_minutes().max(1)
}

fn render_html(email: &VerificationEmail, link: &str) -> String {
    let expiry = email.expires_at.format("%b %-d, %-I:%M %p UTC");
    format!(
        "<p>Hi {name},</p>\
         <p>Your MyEscrow verification code is <strong style=\"font-size: 20px;\">{code}</strong>.</p>\
         <p>Enter this code on the verification page within the next {minutes} minutes ({expiry}).</p>\
         <p>You can also open <a href=\"{link}\">{link}</a> and paste the code there.</p>\
         <p>If you didn't request this, you can ignore the email.</p>",
        name = escape_html(&email.name),
        code = email.code,
        minutes = minutes_left(email.expires_at),
    )
}

fn render_text(email: &VerificationEmail, link: &str) -> String {
    [
        format!("Your MyEscrow verification code is {}.", email.code),
        format!(
            "Enter this code within {} minutes.",
            minutes_left(email.expires_at)
        ),
        format!("Verification page: {link}"),
        String::new(),
        "If you didn't request this code, you can ignore the email.".to_string(),
    ]
    .join("\n")
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
