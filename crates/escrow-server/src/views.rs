//! JSON shapes returned by the dashboard API.
//!
//! Money leaves the server formatted (`"$1,234.56"`); references are exposed
//! as `id`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use escrow_shared::currency::{format_amount_with_suffix, format_currency_from_cents};
use escrow_store::{
    Dispute, DisputePriority, Escrow, EscrowStatus, Notification, TimelineEvent, TransactionType,
    User, WalletTransaction,
};

pub fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryMetric {
    pub id: &'static str,
    pub label: &'static str,
    pub value: String,
    pub meta: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EscrowView {
    pub id: String,
    pub counterpart: String,
    pub amount: String,
    pub stage: String,
    pub due: String,
    pub status: EscrowStatus,
    pub counterparty_approved: bool,
}

impl From<&Escrow> for EscrowView {
    fn from(escrow: &Escrow) -> Self {
        Self {
            id: escrow.reference.clone(),
            counterpart: escrow.counterpart.clone(),
            amount: format_currency_from_cents(escrow.amount_cents),
            stage: escrow.stage.clone(),
            due: escrow.due_description.clone(),
            status: escrow.status,
            counterparty_approved: escrow.counterparty_approved,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DisputeView {
    pub id: String,
    pub title: String,
    pub owner: String,
    pub amount: String,
    pub updated: String,
    pub priority: DisputePriority,
}

impl From<&Dispute> for DisputeView {
    fn from(dispute: &Dispute) -> Self {
        Self {
            id: dispute.reference.clone(),
            title: dispute.title.clone(),
            owner: dispute.owner_team.clone(),
            amount: format_amount_with_suffix(dispute.amount_cents, "held"),
            updated: dispute.updated_label.clone(),
            priority: dispute.priority,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelineView {
    pub id: String,
    pub title: String,
    pub meta: String,
    pub time: String,
    pub status: String,
}

impl From<&TimelineEvent> for TimelineView {
    fn from(event: &TimelineEvent) -> Self {
        Self {
            id: event.id.clone(),
            title: event.title.clone(),
            meta: event.meta.clone(),
            time: event.time_label.clone(),
            status: event.status.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    pub label: String,
    pub detail: String,
    pub meta: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<i64>,
}

impl From<&Notification> for NotificationView {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id.clone(),
            label: notification.label.clone(),
            detail: notification.detail.clone(),
            meta: notification.meta.clone(),
            tx_id: notification.tx_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: i64,
    /// Magnitude only; the sign is carried by `direction`.
    pub amount: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub direction: &'static str,
    pub created_at: String,
}

impl From<&WalletTransaction> for TransactionView {
    fn from(tx: &WalletTransaction) -> Self {
        Self {
            id: tx.id,
            amount: format_currency_from_cents(tx.amount_cents.abs()),
            kind: tx.kind,
            direction: if tx.is_credit() { "credit" } else { "debit" },
            created_at: iso(tx.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_transaction_view_uses_sign_for_direction() {
        let tx = WalletTransaction {
            id: 7,
            user_id: "usr_1000".to_string(),
            amount_cents: -2_550,
            kind: TransactionType::Withdraw,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(TransactionView::from(&tx)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "amount": "$25.50",
                "type": "WITHDRAW",
                "direction": "debit",
                "createdAt": "2026-03-01T12:00:00.000Z",
            })
        );
    }

    #[test]
    fn test_notification_omits_missing_tx() {
        let notification = Notification {
            id: "notif-01".to_string(),
            user_id: "usr_1000".to_string(),
            label: "Welcome".to_string(),
            detail: "Account ready".to_string(),
            meta: "Just now".to_string(),
            tx_id: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(NotificationView::from(&notification)).unwrap();
        assert!(json.get("txId").is_none());
    }
}
