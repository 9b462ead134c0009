//! Escrow and dispute transitions, listings, and the overview aggregate.
//!
//! Every operation is scoped to the calling user. A reference owned by
//! someone else fails exactly like one that does not exist.

use std::cmp::Reverse;
use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use escrow_shared::constants::{
    OVERVIEW_ACTIVE_ESCROWS, OVERVIEW_TIMELINE_EVENTS, WALLET_TRANSACTIONS_LIMIT,
};
use escrow_shared::currency::format_currency_from_cents;
use escrow_store::{
    Dispute, DisputeStatus, DisputeUpdate, Escrow, EscrowStatus, EscrowUpdate, NewEscrow,
    NewTimelineEvent, TimelineEvent,
};

use crate::db::SharedDatabase;
use crate::error::ApiError;
use crate::views::{
    DisputeView, EscrowView, NotificationView, SummaryMetric, TimelineView, TransactionView,
};

const JUST_NOW: &str = "Just now";

/// A validated create request, amount already in cents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowDraft {
    pub title: String,
    pub counterpart: String,
    pub amount_cents: i64,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl EscrowDraft {
    fn into_records(self, owner_id: &str) -> (NewEscrow, NewTimelineEvent) {
        let stage = match &self.category {
            Some(category) => format!("{category} milestone"),
            None => "Initial milestone".to_string(),
        };
        let drafted = NewTimelineEvent {
            title: format!("{} escrow drafted", self.counterpart),
            meta: format!("{} created", self.title),
            time_label: JUST_NOW.to_string(),
            status: "attention".to_string(),
        };
        let escrow = NewEscrow {
            owner_id: owner_id.to_string(),
            title: self.title,
            counterpart: self.counterpart,
            amount_cents: self.amount_cents,
            stage,
            due_description: "Awaiting approval".to_string(),
            status: EscrowStatus::Warning,
            counterparty_approved: false,
            category: self.category,
            description: self.description,
        };
        (escrow, drafted)
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowAction {
    Approve,
    Release,
    Reject,
    Cancel,
}

impl EscrowAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approve" => Some(Self::Approve),
            "release" => Some(Self::Release),
            "reject" => Some(Self::Reject),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Release => "release",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
        }
    }

    pub fn update(self) -> EscrowUpdate {
        match self {
            Self::Approve => EscrowUpdate {
                status: Some(EscrowStatus::Success),
                counterparty_approved: Some(true),
                due_description: Some("Ready for release".to_string()),
                ..Default::default()
            },
            Self::Release => EscrowUpdate {
                status: Some(EscrowStatus::Success),
                counterparty_approved: Some(true),
                due_description: Some("Release queued".to_string()),
                ..Default::default()
            },
            Self::Reject => EscrowUpdate {
                status: Some(EscrowStatus::Warning),
                counterparty_approved: Some(false),
                due_description: Some("Awaiting revisions".to_string()),
                ..Default::default()
            },
            // approval flag is left as it was
            Self::Cancel => EscrowUpdate {
                status: Some(EscrowStatus::Warning),
                stage: Some("Cancelled".to_string()),
                due_description: Some("Cancelled".to_string()),
                ..Default::default()
            },
        }
    }

    /// Timeline entry written together with the update, if any.
    pub fn timeline_event(self, escrow: &Escrow) -> Option<NewTimelineEvent> {
        match self {
            Self::Release => Some(NewTimelineEvent {
                title: format!("Release approved for {}", escrow.reference),
                meta: format!("{} milestone queued", escrow.counterpart),
                time_label: JUST_NOW.to_string(),
                status: "released".to_string(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeAction {
    Launch,
    Resolve,
}

impl DisputeAction {
    pub fn update(self) -> DisputeUpdate {
        match self {
            Self::Launch => DisputeUpdate {
                workspace_launched: Some(true),
                updated_label: Some("Workspace launched just now".to_string()),
                ..Default::default()
            },
            Self::Resolve => DisputeUpdate {
                status: Some(DisputeStatus::Resolved),
                updated_label: Some("Resolved".to_string()),
                ..Default::default()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverviewTotals {
    pub contracts: usize,
    pub held_cents: i64,
    pub scheduled_cents: i64,
    pub approvals_ready: usize,
    pub needs_attention: usize,
    pub counterparts: usize,
}

/// Amounts saturate at `i64::MAX` instead of overflowing; rows can be written
/// out of band without the request-side amount cap.
pub fn totals(escrows: &[Escrow]) -> OverviewTotals {
    let approved = escrows.iter().filter(|e| e.counterparty_approved);
    OverviewTotals {
        contracts: escrows.len(),
        held_cents: sum_cents(escrows.iter()),
        scheduled_cents: sum_cents(approved.clone()),
        approvals_ready: approved.count(),
        needs_attention: escrows
            .iter()
            .filter(|e| e.status == EscrowStatus::Warning)
            .count(),
        counterparts: escrows
            .iter()
            .map(|e| e.counterpart.as_str())
            .collect::<HashSet<_>>()
            .len(),
    }
}

fn sum_cents<'a>(escrows: impl Iterator<Item = &'a Escrow>) -> i64 {
    escrows.fold(0i64, |acc, e| acc.saturating_add(e.amount_cents))
}

fn urgency(status: EscrowStatus) -> u8 {
    match status {
        EscrowStatus::Warning => 0,
        EscrowStatus::Success => 1,
    }
}

/// Active escrows, warnings first, most recently updated first within a
/// status, at most `limit`.
pub fn urgent_escrows(escrows: &[Escrow], limit: usize) -> Vec<&Escrow> {
    let mut active: Vec<&Escrow> = escrows
        .iter()
        .filter(|e| matches!(e.status, EscrowStatus::Success | EscrowStatus::Warning))
        .collect();
    active.sort_by_key(|e| (urgency(e.status), Reverse(e.updated_at), Reverse(e.id)));
    active.truncate(limit);
    active
}

pub fn summary_metrics(totals: &OverviewTotals, open_disputes: usize) -> Vec<SummaryMetric> {
    vec![
        SummaryMetric {
            id: "held",
            label: "Held in Escrow",
            value: format_currency_from_cents(totals.held_cents),
            meta: format!("{} active contracts", totals.contracts),
        },
        SummaryMetric {
            id: "release",
            label: "Releases scheduled",
            value: format_currency_from_cents(totals.scheduled_cents),
            meta: format!("{} approvals ready", totals.approvals_ready),
        },
        SummaryMetric {
            id: "disputes",
            label: "Disputes open",
            value: format!("{open_disputes} cases"),
            meta: if totals.needs_attention > 0 {
                format!("{} contracts need attention", totals.needs_attention)
            } else {
                "All contracts on track".to_string()
            },
        },
        SummaryMetric {
            id: "verified",
            label: "Verified payers",
            value: format!("{} teams", totals.counterparts),
            meta: "Live counterparties".to_string(),
        },
    ]
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub summary_metrics: Vec<SummaryMetric>,
    pub active_escrows: Vec<EscrowView>,
    pub timeline_events: Vec<TimelineView>,
}

/// Pure aggregation over already-loaded rows.
pub fn build_overview(
    escrows: &[Escrow],
    open_disputes: usize,
    timeline: &[TimelineEvent],
) -> Overview {
    Overview {
        summary_metrics: summary_metrics(&totals(escrows), open_disputes),
        active_escrows: urgent_escrows(escrows, OVERVIEW_ACTIVE_ESCROWS)
            .into_iter()
            .map(EscrowView::from)
            .collect(),
        timeline_events: timeline
            .iter()
            .take(OVERVIEW_TIMELINE_EVENTS)
            .map(TimelineView::from)
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Dashboard {
    db: SharedDatabase,
}

impl Dashboard {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    pub async fn overview(&self, user_id: &str) -> Result<Overview, ApiError> {
        let user_id = user_id.to_string();
        self.db
            .run(move |db| {
                let escrows = db.list_escrows_for_owner(&user_id)?;
                let disputes = db.list_open_disputes(&user_id)?;
                let timeline =
                    db.recent_timeline_events(&user_id, OVERVIEW_TIMELINE_EVENTS as u32)?;
                Ok(build_overview(&escrows, disputes.len(), &timeline))
            })
            .await
    }

    pub async fn list_escrows(&self, user_id: &str) -> Result<Vec<EscrowView>, ApiError> {
        let user_id = user_id.to_string();
        self.db
            .run(move |db| {
                let escrows = db.list_escrows_for_owner(&user_id)?;
                Ok(escrows.iter().map(EscrowView::from).collect())
            })
            .await
    }

    /// Create an escrow in `warning` state together with its "drafted"
    /// timeline entry.
    pub async fn create_escrow(&self, user_id: &str, draft: EscrowDraft) -> Result<Escrow, ApiError> {
        let (new, drafted) = draft.into_records(user_id);
        let (escrow, _) = self
            .db
            .run(move |db| Ok(db.create_escrow(&new, &drafted)?))
            .await?;
        Ok(escrow)
    }

    pub async fn apply_escrow_action(
        &self,
        user_id: &str,
        reference: &str,
        action: EscrowAction,
    ) -> Result<Escrow, ApiError> {
        let user_id = user_id.to_string();
        let reference = reference.to_string();
        let escrow = self
            .db
            .run(move |db| {
                db.update_escrow_for_owner(&user_id, &reference, &action.update(), |escrow| {
                    action.timeline_event(escrow)
                })
                .map_err(|e| ApiError::from_store(e, "Escrow not found."))
            })
            .await?;

        info!(
            reference = %escrow.reference,
            action = action.as_str(),
            status = %escrow.status,
            "Escrow transition applied"
        );
        Ok(escrow)
    }

    pub async fn list_disputes(&self, user_id: &str) -> Result<Vec<DisputeView>, ApiError> {
        let user_id = user_id.to_string();
        self.db
            .run(move |db| {
                let disputes = db.list_open_disputes(&user_id)?;
                Ok(disputes.iter().map(DisputeView::from).collect())
            })
            .await
    }

    pub async fn apply_dispute_action(
        &self,
        user_id: &str,
        reference: &str,
        action: DisputeAction,
    ) -> Result<Dispute, ApiError> {
        let user_id = user_id.to_string();
        let reference = reference.to_string();
        self.db
            .run(move |db| {
                db.update_dispute_for_owner(&user_id, &reference, &action.update())
                    .map_err(|e| ApiError::from_store(e, "Dispute not found."))
            })
            .await
    }

    pub async fn list_notifications(
        &self,
        user_id: &str,
    ) -> Result<Vec<NotificationView>, ApiError> {
        let user_id = user_id.to_string();
        self.db
            .run(move |db| {
                let notifications = db.list_notifications(&user_id)?;
                Ok(notifications.iter().map(NotificationView::from).collect())
            })
            .await
    }

    pub async fn list_transactions(&self, user_id: &str) -> Result<Vec<TransactionView>, ApiError> {
        let user_id = user_id.to_string();
        self.db
            .run(move |db| {
                let transactions =
                    db.list_wallet_transactions(&user_id, WALLET_TRANSACTIONS_LIMIT)?;
                Ok(transactions.iter().map(TransactionView::from).collect())
            })
            .await
    }
}
