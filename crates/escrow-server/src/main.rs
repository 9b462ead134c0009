//! # escrow-server
//!
//! HTTP backend for the MyEscrow dashboard.
//!
//! This binary provides:
//! - **Account endpoints** for signup, login and e-mail verification with
//!   short-lived one-time codes
//! - **Dashboard endpoints** for escrows, disputes, notifications and the
//!   wallet ledger, scoped to the signed-in user
//! - **SQLite persistence** through `escrow-store`

mod api;
mod auth;
mod config;
mod db;
mod error;
mod mailer;
mod routes;
mod services;
mod validation;
mod views;

use tracing::info;
use tracing_subscriber::EnvFilter;

use escrow_shared::constants::APP_NAME;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::db::SharedDatabase;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,escrow_server=debug")),
        )
        .init();

    info!("Starting {} API v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = SharedDatabase::open(&config.database_path)
        .map_err(|e| anyhow::anyhow!("failed to open database: {e}"))?;
    info!(path = %config.database_path.display(), "Database ready");

    let mailer = mailer::from_config(&config);
    info!(
        backend = mailer.backend(),
        verification_required = config.verification_required,
        "Verification mailer ready"
    );

    let http_addr = config.http_addr;
    let app_state = AppState::new(config, db, mailer);

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
