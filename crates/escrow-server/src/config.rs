//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use escrow_shared::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_SESSION_TTL_HOURS, DEFAULT_VERIFICATION_CODE_DIGITS,
    DEFAULT_VERIFICATION_TTL_MINUTES, MAX_VERIFICATION_CODE_DIGITS, MIN_VERIFICATION_CODE_DIGITS,
};

/// Secret used when `SESSION_SECRET` is not set. Development only.
pub const DEV_SESSION_SECRET: &str = "dev-secret-change-me";

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:4000`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./escrow.db`
    pub database_path: PathBuf,

    /// Key material for bearer tokens.
    /// Env: `SESSION_SECRET`
    pub session_secret: String,

    /// Env: `SESSION_TTL_HOURS`
    pub session_ttl_hours: i64,

    // -- Email verification --

    /// Whether signup must be confirmed by email before login.
    /// Env: `EMAIL_VERIFICATION_REQUIRED` (true/false)
    /// Default: `true`
    pub verification_required: bool,

    /// Env: `EMAIL_VERIFICATION_CODE_DIGITS`, clamped to 4..=9.
    pub verification_code_digits: u32,

    /// Env: `EMAIL_VERIFICATION_TTL_MINUTES`
    pub verification_ttl_minutes: i64,

    /// Echo the plaintext code back in verification payloads.
    /// Env: `AUTH_DEBUG_CODES`
    /// Default: `false`
    pub debug_codes: bool,

    // -- Outbound email --

    /// Env: `RESEND_API_KEY`. Unset means codes are only logged.
    pub resend_api_key: Option<String>,

    /// Env: `EMAIL_FROM`
    pub email_from: String,

    /// Public URL of the web app, used for links in emails.
    /// Env: `APP_URL`
    pub app_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./escrow.db"),
            session_secret: DEV_SESSION_SECRET.to_string(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            verification_required: true,
            verification_code_digits: DEFAULT_VERIFICATION_CODE_DIGITS,
            verification_ttl_minutes: DEFAULT_VERIFICATION_TTL_MINUTES,
            debug_codes: false,
            resend_api_key: None,
            email_from: "MyEscrow <no-reply@myescrow.local>".to_string(),
            app_url: "http://localhost:3000".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            set_parsed(&mut config.http_addr, "HTTP_ADDR", &addr);
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        match lookup("SESSION_SECRET") {
            Some(secret) if !secret.is_empty() => config.session_secret = secret,
            _ => tracing::warn!("SESSION_SECRET not set, using the development secret"),
        }

        if let Some(val) = lookup("SESSION_TTL_HOURS") {
            set_positive(&mut config.session_ttl_hours, "SESSION_TTL_HOURS", &val);
        }

        // -- Email verification --

        if let Some(val) = lookup("EMAIL_VERIFICATION_REQUIRED") {
            config.verification_required = parse_flag(&val);
        }

        if let Some(val) = lookup("EMAIL_VERIFICATION_CODE_DIGITS") {
            set_parsed(
                &mut config.verification_code_digits,
                "EMAIL_VERIFICATION_CODE_DIGITS",
                &val,
            );
        }
        config.verification_code_digits = config
            .verification_code_digits
            .clamp(MIN_VERIFICATION_CODE_DIGITS, MAX_VERIFICATION_CODE_DIGITS);

        if let Some(val) = lookup("EMAIL_VERIFICATION_TTL_MINUTES") {
            set_positive(
                &mut config.verification_ttl_minutes,
                "EMAIL_VERIFICATION_TTL_MINUTES",
                &val,
            );
        }

        if let Some(val) = lookup("AUTH_DEBUG_CODES") {
            config.debug_codes = parse_flag(&val);
        }

        // -- Outbound email --

        if let Some(key) = lookup("RESEND_API_KEY") {
            if !key.is_empty() {
                config.resend_api_key = Some(key);
            }
        }

        if let Some(from) = lookup("EMAIL_FROM") {
            config.email_from = from;
        }

        if let Some(url) = lookup("APP_URL") {
            config.app_url = url;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.session_secret == DEV_SESSION_SECRET
    }
}

// Secrets stay out of `?config` log lines.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("verification_required", &self.verification_required)
            .field("verification_code_digits", &self.verification_code_digits)
            .field("verification_ttl_minutes", &self.verification_ttl_minutes)
            .field("debug_codes", &self.debug_codes)
            .field("resend_configured", &self.resend_api_key.is_some())
            .field("email_from", &self.email_from)
            .field("app_url", &self.app_url)
            .finish()
    }
}

fn parse_flag(value: &str) -> bool {
    value != "false" && value != "0"
}

fn set_parsed<T: FromStr>(slot: &mut T, key: &str, value: &str) {
    match value.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => tracing::warn!(key, value, "Invalid value, using default"),
    }
}

fn set_positive(slot: &mut i64, key: &str, value: &str) {
    match value.trim().parse::<i64>() {
        Ok(parsed) if parsed > 0 => *slot = parsed,
        _ => tracing::warn!(key, value, "Expected a positive integer, using default"),
    }
}
