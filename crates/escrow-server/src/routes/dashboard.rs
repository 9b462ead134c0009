use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use escrow_shared::currency::cents_to_dollars;
use escrow_store::TransactionType;

use crate::api::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::services::dashboard::{DisputeAction, EscrowAction, Overview};
use crate::validation::{CreateEscrowRequest, Payload, WalletRequest};
use crate::views::{iso, DisputeView, EscrowView, NotificationView, TransactionView};

#[derive(Serialize)]
pub struct EscrowList {
    escrows: Vec<EscrowView>,
}

#[derive(Serialize)]
pub struct DisputeList {
    disputes: Vec<DisputeView>,
}

#[derive(Serialize)]
pub struct NotificationList {
    notifications: Vec<NotificationView>,
}

#[derive(Serialize)]
pub struct TransactionList {
    transactions: Vec<TransactionView>,
}

#[derive(Serialize)]
pub struct WalletResponse {
    success: bool,
    amount: f64,
    balance: f64,
}

pub async fn overview(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Overview>, ApiError> {
    Ok(Json(state.dashboard.overview(&user.id).await?))
}

// ─── Escrows ───

pub async fn list_escrows(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<EscrowList>, ApiError> {
    let escrows = state.dashboard.list_escrows(&user.id).await?;
    Ok(Json(EscrowList { escrows }))
}

pub async fn create_escrow(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(body): Payload<CreateEscrowRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let draft = body.validate()?;
    let escrow = state.dashboard.create_escrow(&user.id, draft).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "escrowId": escrow.reference,
            "reference": escrow.reference,
            "createdAt": iso(escrow.created_at),
        })),
    ))
}

/// `POST /api/dashboard/escrows/:id/:action` for approve, release, reject
/// and cancel.
pub async fn escrow_action(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((reference, action)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let action = EscrowAction::parse(&action)
        .ok_or_else(|| ApiError::NotFound("Route not found.".to_string()))?;

    let escrow = state
        .dashboard
        .apply_escrow_action(&user.id, &reference, action)
        .await?;

    let body = match action {
        EscrowAction::Release => json!({
            "success": true,
            "escrowId": escrow.reference,
            "releasedAt": iso(Utc::now()),
        }),
        _ => json!({ "success": true, "escrowId": escrow.reference }),
    };
    Ok(Json(body))
}

// ─── Disputes ───

pub async fn list_disputes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<DisputeList>, ApiError> {
    let disputes = state.dashboard.list_disputes(&user.id).await?;
    Ok(Json(DisputeList { disputes }))
}

pub async fn launch_dispute(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(reference): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let dispute = state
        .dashboard
        .apply_dispute_action(&user.id, &reference, DisputeAction::Launch)
        .await?;
    Ok(Json(json!({
        "disputeId": dispute.reference,
        "launchedAt": iso(dispute.updated_at),
    })))
}

pub async fn resolve_dispute(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(reference): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let dispute = state
        .dashboard
        .apply_dispute_action(&user.id, &reference, DisputeAction::Resolve)
        .await?;
    Ok(Json(json!({
        "disputeId": dispute.reference,
        "resolvedAt": iso(dispute.updated_at),
    })))
}

// ─── Notifications & wallet ───

pub async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<NotificationList>, ApiError> {
    let notifications = state.dashboard.list_notifications(&user.id).await?;
    Ok(Json(NotificationList { notifications }))
}

pub async fn top_up(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(body): Payload<WalletRequest>,
) -> Result<Json<WalletResponse>, ApiError> {
    let cents = body.amount_cents()?;
    let movement = state
        .accounts
        .adjust_balance(&user.id, cents, TransactionType::Topup)
        .await?;
    Ok(Json(WalletResponse {
        success: true,
        amount: body.amount,
        balance: cents_to_dollars(movement.user.wallet_balance_cents),
    }))
}

pub async fn withdraw(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(body): Payload<WalletRequest>,
) -> Result<Json<WalletResponse>, ApiError> {
    let cents = body.amount_cents()?;
    let movement = state
        .accounts
        .adjust_balance(&user.id, -cents, TransactionType::Withdraw)
        .await?;
    Ok(Json(WalletResponse {
        success: true,
        amount: body.amount,
        balance: cents_to_dollars(movement.user.wallet_balance_cents),
    }))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<TransactionList>, ApiError> {
    let transactions = state.dashboard.list_transactions(&user.id).await?;
    Ok(Json(TransactionList { transactions }))
}
