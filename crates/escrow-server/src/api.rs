use std::sync::Arc;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use escrow_shared::session::SessionSigner;

use crate::config::ServerConfig;
use crate::db::SharedDatabase;
use crate::mailer::VerificationMailer;
use crate::routes::{auth, dashboard};
use crate::services::accounts::Accounts;
use crate::services::dashboard::Dashboard;
use crate::services::verification::{EmailVerification, VerificationSettings};

#[derive(Clone)]
pub struct AppState {
    pub accounts: Accounts,
    pub verification: Arc<EmailVerification>,
    pub dashboard: Dashboard,
    pub sessions: SessionSigner,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        db: SharedDatabase,
        mailer: Arc<dyn VerificationMailer>,
    ) -> Self {
        Self {
            accounts: Accounts::new(db.clone()),
            verification: Arc::new(EmailVerification::new(
                db.clone(),
                mailer,
                VerificationSettings::from_config(&config),
            )),
            dashboard: Dashboard::new(db),
            sessions: SessionSigner::from_secret(&config.session_secret),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/verify-email", post(auth::verify_email))
        .route("/resend-verification", post(auth::resend_verification));

    let dashboard_routes = Router::new()
        .route("/overview", get(dashboard::overview))
        .route("/escrows", get(dashboard::list_escrows))
        .route("/escrows/create", post(dashboard::create_escrow))
        .route("/escrows/:id/:action", post(dashboard::escrow_action))
        .route("/disputes", get(dashboard::list_disputes))
        .route("/disputes/:id/launch", post(dashboard::launch_dispute))
        .route("/disputes/:id/resolve", post(dashboard::resolve_dispute))
        .route("/notifications", get(dashboard::list_notifications))
        .route("/wallet/topup", post(dashboard::top_up))
        .route("/wallet/withdraw", post(dashboard::withdraw))
        .route("/wallet/transactions", get(dashboard::list_transactions));

    Router::new()
        .route("/", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/dashboard", dashboard_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::mailer::testing::RecordingMailer;

    const PASSWORD: &str = "Str0ng!Passw0rd";

    struct TestApp {
        _dir: tempfile::TempDir,
        router: Router,
        mailer: Arc<RecordingMailer>,
    }

    fn test_app(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig {
            database_path: dir.path().join("api.db"),
            session_secret: "test-secret".to_string(),
            ..ServerConfig::default()
        };
        configure(&mut config);

        let db = SharedDatabase::open(&config.database_path).unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(config, db, mailer.clone());

        TestApp {
            _dir: dir,
            router: build_router(state),
            mailer,
        }
    }

    impl TestApp {
        async fn call(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let req = match body {
                Some(body) => req
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string())),
                None => req.body(Body::empty()),
            }
            .unwrap();

            let resp = self.router.clone().oneshot(req).await.unwrap();
            let status = resp.status();
            let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
            self.call(Method::POST, uri, token, Some(body)).await
        }

        async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
            self.call(Method::GET, uri, Some(token), None).await
        }

        /// Sign up and verify, returning a bearer token.
        async fn verified_user(&self, name: &str, email: &str) -> String {
            let (status, body) = self
                .post(
                    "/api/auth/signup",
                    None,
                    json!({ "name": name, "email": email, "password": PASSWORD }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            assert_eq!(body["verificationRequired"], true);

            let code = self.mailer.last_code_for(email).unwrap();
            let (status, body) = self
                .post(
                    "/api/auth/verify-email",
                    None,
                    json!({ "email": email, "code": code }),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            body["token"].as_str().unwrap().to_string()
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(|_| {});
        let (status, body) = app.call(Method::GET, "/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_signup_verify_login_escrow_flow() {
        let app = test_app(|_| {});

        let (status, body) = app
            .post(
                "/api/auth/signup",
                None,
                json!({ "name": "Ada Lovelace", "email": "Ada@Example.com", "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["verificationRequired"], true);
        assert_eq!(body["email"], "ada@example.com");
        assert!(body.get("debugCode").is_none());
        assert!(body.get("token").is_none());

        // unverified accounts cannot log in yet
        let (status, _) = app
            .post(
                "/api/auth/login",
                None,
                json!({ "email": "ada@example.com", "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let code = app.mailer.last_code_for("ada@example.com").unwrap();
        let (status, body) = app
            .post(
                "/api/auth/verify-email",
                None,
                json!({ "email": "ada@example.com", "code": code }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "ada@example.com");

        let (status, body) = app
            .post(
                "/api/auth/login",
                None,
                json!({ "email": "ada@example.com", "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "Ada Lovelace");
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = app
            .post(
                "/api/dashboard/escrows/create",
                Some(&token),
                json!({ "title": "Website build", "counterpart": "Acme", "amount": 150.0 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        let reference = body["reference"].as_str().unwrap().to_string();
        assert_eq!(reference, "PO-0650");

        let (_, overview) = app.get("/api/dashboard/overview", &token).await;
        let active = &overview["activeEscrows"][0];
        assert_eq!(active["id"], reference.as_str());
        assert_eq!(active["amount"], "$150.00");
        assert_eq!(active["status"], "warning");
        assert_eq!(active["counterpartyApproved"], false);
        assert_eq!(overview["summaryMetrics"][0]["value"], "$150.00");
        assert_eq!(overview["timelineEvents"][0]["title"], "Acme escrow drafted");

        let (status, body) = app
            .post(
                &format!("/api/dashboard/escrows/{reference}/release"),
                Some(&token),
                json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["escrowId"], reference.as_str());
        assert!(body["releasedAt"].is_string());

        let (_, listed) = app.get("/api/dashboard/escrows", &token).await;
        let escrow = &listed["escrows"][0];
        assert_eq!(escrow["status"], "success");
        assert_eq!(escrow["counterpartyApproved"], true);
        assert_eq!(escrow["due"], "Release queued");

        let (_, overview) = app.get("/api/dashboard/overview", &token).await;
        assert_eq!(overview["activeEscrows"][0]["status"], "success");
        assert_eq!(
            overview["timelineEvents"][0]["title"],
            format!("Release approved for {reference}")
        );
    }

    #[tokio::test]
    async fn test_release_of_foreign_escrow_is_not_found() {
        let app = test_app(|_| {});
        let owner = app.verified_user("Owner Team", "owner@example.com").await;
        let intruder = app.verified_user("Intruder", "intruder@example.com").await;

        let (_, body) = app
            .post(
                "/api/dashboard/escrows/create",
                Some(&owner),
                json!({ "title": "Audit", "counterpart": "Acme", "amount": 10 }),
            )
            .await;
        let reference = body["reference"].as_str().unwrap().to_string();

        let (status, foreign) = app
            .post(
                &format!("/api/dashboard/escrows/{reference}/release"),
                Some(&intruder),
                json!({}),
            )
            .await;
        let (missing_status, missing) = app
            .post("/api/dashboard/escrows/PO-9999/release", Some(&intruder), json!({}))
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(missing_status, StatusCode::NOT_FOUND);
        assert_eq!(foreign, missing);

        let (_, listed) = app.get("/api/dashboard/escrows", &owner).await;
        assert_eq!(listed["escrows"][0]["status"], "warning");
    }

    #[tokio::test]
    async fn test_dashboard_requires_valid_token() {
        let app = test_app(|_| {});

        let (status, body) = app
            .call(Method::GET, "/api/dashboard/overview", None, None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        let (status, _) = app.get("/api/dashboard/overview", "not-a-token").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wallet_movements_and_ledger() {
        let app = test_app(|_| {});
        let token = app.verified_user("Ada Lovelace", "ada@example.com").await;

        let (status, body) = app
            .post("/api/dashboard/wallet/topup", Some(&token), json!({ "amount": 100.25 }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "amount": 100.25, "balance": 100.25 }));

        let (status, body) = app
            .post("/api/dashboard/wallet/withdraw", Some(&token), json!({ "amount": 100.26 }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = app
            .post("/api/dashboard/wallet/withdraw", Some(&token), json!({ "amount": 40 }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], 60.25);

        let (_, ledger) = app.get("/api/dashboard/wallet/transactions", &token).await;
        let transactions = ledger["transactions"].as_array().unwrap();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0]["type"], "WITHDRAW");
        assert_eq!(transactions[0]["direction"], "debit");
        assert_eq!(transactions[0]["amount"], "$40.00");
        assert_eq!(transactions[1]["direction"], "credit");

        let (_, notifications) = app.get("/api/dashboard/notifications", &token).await;
        let notifications = notifications["notifications"].as_array().unwrap();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0]["txId"], transactions[0]["id"]);
    }

    #[tokio::test]
    async fn test_payload_validation_lists_issues() {
        let app = test_app(|_| {});

        let (status, body) = app
            .post(
                "/api/auth/signup",
                None,
                json!({ "name": "A", "email": "nope", "password": "password" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request payload.");
        let paths: Vec<&str> = body["issues"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["path"].as_str().unwrap())
            .collect();
        assert!(paths.contains(&"name"));
        assert!(paths.contains(&"email"));
        assert!(paths.contains(&"password"));

        let (status, body) = app
            .post("/api/auth/login", None, json!({ "email": "ada@example.com" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["issues"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_escrow_amount_is_rejected() {
        let app = test_app(|_| {});
        let token = app.verified_user("Ada Lovelace", "ada@example.com").await;

        let (status, body) = app
            .post(
                "/api/dashboard/escrows/create",
                Some(&token),
                json!({ "title": "Huge", "counterpart": "Acme", "amount": 90_071_992_547_409.0 }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["issues"][0]["path"], "amount");

        let (status, overview) = app.get("/api/dashboard/overview", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(overview["summaryMetrics"][0]["value"], "$0.00");
    }

    #[tokio::test]
    async fn test_duplicate_signup_conflicts() {
        let app = test_app(|_| {});
        app.verified_user("Ada Lovelace", "ada@example.com").await;

        let (status, _) = app
            .post(
                "/api/auth/signup",
                None,
                json!({ "name": "Ada Again", "email": " ADA@example.com", "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_signup_without_verification_returns_token() {
        let app = test_app(|config| config.verification_required = false);

        let (status, body) = app
            .post(
                "/api/auth/signup",
                None,
                json!({ "name": "Ada Lovelace", "email": "ada@example.com", "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["token"].is_string());
        assert_eq!(body["user"]["id"], "usr_1000");
        assert!(app.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_resend_does_not_reveal_unknown_accounts() {
        let app = test_app(|config| config.debug_codes = true);
        app.post(
            "/api/auth/signup",
            None,
            json!({ "name": "Ada Lovelace", "email": "ada@example.com", "password": PASSWORD }),
        )
        .await;

        let (status, known) = app
            .post(
                "/api/auth/resend-verification",
                None,
                json!({ "email": "ada@example.com" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(known["verificationRequired"], true);
        assert!(known.get("debugCode").is_none());

        let (status, unknown) = app
            .post(
                "/api/auth/resend-verification",
                None,
                json!({ "email": "ghost@example.com" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unknown["verificationRequired"], true);
        assert!(unknown["expiresAt"].is_string());

        let keys = |v: &Value| {
            let mut keys: Vec<String> = v.as_object().unwrap().keys().cloned().collect();
            keys.sort();
            keys
        };
        assert_eq!(keys(&known), keys(&unknown));
    }

    #[tokio::test]
    async fn test_repeated_requests_from_one_client_are_served() {
        let app = test_app(|_| {});

        // Nothing is remembered between requests, so a busy client is never
        // turned away.
        for _ in 0..50 {
            let req = Request::builder()
                .uri("/")
                .header("x-forwarded-for", "203.0.113.9")
                .body(Body::empty())
                .unwrap();
            let resp = app.router.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }
}
