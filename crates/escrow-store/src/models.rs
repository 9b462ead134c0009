//! Domain model structs persisted in the SQLite database.
//!
//! Money is always integer cents. Enumerations are stored as their lowercase
//! (or, for wallet transactions, uppercase) text labels.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text-backed enum: `as_str`/`parse` plus rusqlite conversions.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($label => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                Self::parse(text).ok_or_else(|| {
                    FromSqlError::Other(
                        format!(concat!("unknown ", stringify!($name), " '{}'"), text).into(),
                    )
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// An account holder with a wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// `usr_<sequence>`.
    pub id: String,
    /// Normalized (trimmed, lowercased) email, unique.
    pub email: String,
    pub name: String,
    /// Salted slow hash of the password. Never serialized to clients.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Always `>= 0`.
    pub wallet_balance_cents: i64,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for account creation. The email must already be normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
}

// ---------------------------------------------------------------------------
// Escrow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EscrowStatus {
    Success,
    Warning,
}

text_enum!(EscrowStatus {
    Success => "success",
    Warning => "warning",
});

/// An escrow contract owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Escrow {
    pub id: i64,
    /// `PO-<sequence>`, immutable after creation.
    pub reference: String,
    pub owner_id: String,
    pub title: String,
    /// Free-text name of the other party.
    pub counterpart: String,
    /// Always `> 0`.
    pub amount_cents: i64,
    pub stage: String,
    pub due_description: String,
    pub status: EscrowStatus,
    pub counterparty_approved: bool,
    pub category: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEscrow {
    pub owner_id: String,
    pub title: String,
    pub counterpart: String,
    pub amount_cents: i64,
    pub stage: String,
    pub due_description: String,
    pub status: EscrowStatus,
    pub counterparty_approved: bool,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// Partial update applied by an escrow state transition. `None` leaves the
/// column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscrowUpdate {
    pub status: Option<EscrowStatus>,
    pub counterparty_approved: Option<bool>,
    pub stage: Option<String>,
    pub due_description: Option<String>,
}

// ---------------------------------------------------------------------------
// Dispute
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisputePriority {
    High,
    Medium,
    Low,
}

text_enum!(DisputePriority {
    High => "high",
    Medium => "medium",
    Low => "low",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisputeStatus {
    Open,
    Resolved,
}

text_enum!(DisputeStatus {
    Open => "open",
    Resolved => "resolved",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dispute {
    pub id: i64,
    /// `DSP-<sequence>`.
    pub reference: String,
    pub owner_id: String,
    pub title: String,
    pub owner_team: String,
    pub amount_cents: i64,
    pub updated_label: String,
    pub priority: DisputePriority,
    pub status: DisputeStatus,
    pub workspace_launched: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDispute {
    pub owner_id: String,
    pub title: String,
    pub owner_team: String,
    pub amount_cents: i64,
    pub updated_label: String,
    pub priority: DisputePriority,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisputeUpdate {
    pub status: Option<DisputeStatus>,
    pub workspace_launched: Option<bool>,
    pub updated_label: Option<String>,
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Append-only activity record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineEvent {
    /// `tl-<sequence>`.
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub meta: String,
    pub time_label: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTimelineEvent {
    pub title: String,
    pub meta: String,
    pub time_label: String,
    pub status: String,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    /// `notif-<sequence>`.
    pub id: String,
    pub user_id: String,
    pub label: String,
    pub detail: String,
    pub meta: String,
    pub tx_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub label: String,
    pub detail: String,
    pub meta: String,
    pub tx_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Wallet transaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Topup,
    Withdraw,
    Release,
}

text_enum!(TransactionType {
    Topup => "TOPUP",
    Withdraw => "WITHDRAW",
    Release => "RELEASE",
});

/// Append-only ledger entry. `amount_cents` is signed: credits are positive,
/// debits negative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletTransaction {
    pub id: i64,
    pub user_id: String,
    pub amount_cents: i64,
    pub kind: TransactionType,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn is_credit(&self) -> bool {
        self.amount_cents >= 0
    }
}

/// Everything one wallet movement writes, committed together.
#[derive(Debug, Clone)]
pub struct WalletMovement {
    pub user: User,
    pub transaction: WalletTransaction,
    pub notification: Notification,
}

// ---------------------------------------------------------------------------
// Email verification token
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailVerificationToken {
    pub id: Uuid,
    pub user_id: String,
    /// One-way hash of the numeric code; the code itself is never stored.
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
