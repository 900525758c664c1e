//! Commission approval workflow.
//!
//! ```text
//! pending ──approve──▶ approved ──mark_paid──▶ paid
//!    │
//!    └────reject────▶ rejected
//! ```
//!
//! `paid` and `rejected` are terminal and nothing ever returns to `pending`.
//! Every operation takes the current value and returns the replacement; the
//! input is left untouched when a transition is refused.

use crate::error::{Result, SalesEngineError};
use crate::schema::{ApprovalRecord, CollaboratorId, Commission, CommissionStatus};
use chrono::{DateTime, Utc};
use log::info;

impl CommissionStatus {
    pub fn can_transition_to(self, next: CommissionStatus) -> bool {
        matches!(
            (self, next),
            (CommissionStatus::Pending, CommissionStatus::Approved)
                | (CommissionStatus::Pending, CommissionStatus::Rejected)
                | (CommissionStatus::Approved, CommissionStatus::Paid)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CommissionStatus::Paid | CommissionStatus::Rejected)
    }
}

fn ensure_transition(
    commission: &Commission,
    next: CommissionStatus,
    action: &'static str,
) -> Result<()> {
    if commission.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(SalesEngineError::InvalidTransition {
            commission_id: commission.id,
            from: commission.status,
            action,
        })
    }
}

fn clean_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

pub fn approve(
    commission: &Commission,
    approver_id: CollaboratorId,
    notes: Option<&str>,
    at: DateTime<Utc>,
) -> Result<Commission> {
    ensure_transition(commission, CommissionStatus::Approved, "approved")?;

    info!(
        "Commission #{} for collaborator #{} ({}) approved by #{}",
        commission.id, commission.collaborator_id, commission.period, approver_id
    );

    Ok(Commission {
        status: CommissionStatus::Approved,
        approval: Some(ApprovalRecord {
            approver_id,
            decided_at: at,
            notes: clean_notes(notes),
        }),
        ..commission.clone()
    })
}

/// Rejection always needs a reason.
pub fn reject(
    commission: &Commission,
    approver_id: CollaboratorId,
    notes: &str,
    at: DateTime<Utc>,
) -> Result<Commission> {
    ensure_transition(commission, CommissionStatus::Rejected, "rejected")?;

    let reason = clean_notes(Some(notes)).ok_or_else(|| {
        SalesEngineError::validation(
            "Commission",
            format!("rejecting commission #{} requires a reason", commission.id),
        )
    })?;

    info!(
        "Commission #{} for collaborator #{} ({}) rejected by #{}",
        commission.id, commission.collaborator_id, commission.period, approver_id
    );

    Ok(Commission {
        status: CommissionStatus::Rejected,
        approval: Some(ApprovalRecord {
            approver_id,
            decided_at: at,
            notes: Some(reason),
        }),
        ..commission.clone()
    })
}

pub fn mark_paid(commission: &Commission) -> Result<Commission> {
    ensure_transition(commission, CommissionStatus::Paid, "paid")?;

    info!(
        "Commission #{} for collaborator #{} ({}) marked as paid",
        commission.id, commission.collaborator_id, commission.period
    );

    Ok(Commission {
        status: CommissionStatus::Paid,
        ..commission.clone()
    })
}
