//! Month close: turns last month's sales into pending commissions and rolls
//! recurring monthly goals into the new month.
//!
//! [`close_month`] is the checked entry point and refuses to run when the
//! period has nothing to close or already has commissions.
//! [`compute_month_close`] is the raw computation underneath; it performs no
//! such check, so applying its output twice duplicates every commission.

use crate::commission::CommissionCalculator;
use crate::error::{DataWarning, Result, SalesEngineError};
use crate::overrides::ClosingOverrides;
use crate::period::{MonthPeriod, Period};
use crate::schema::*;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClosingRequest {
    /// The (possibly simulated) current instant. The month before it is closed.
    pub now: DateTime<Utc>,
    #[serde(default)]
    pub overrides: ClosingOverrides,
}

impl ClosingRequest {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            overrides: ClosingOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: ClosingOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthCloseOutcome {
    pub closing_period: MonthPeriod,
    pub next_period: MonthPeriod,
    pub new_commissions: Vec<Commission>,
    /// The whole goal collection after closing: every previous goal (closed
    /// ones marked completed) followed by the new successors.
    pub goals: Vec<Goal>,
    pub completed_goal_ids: Vec<GoalId>,
    pub created_goal_ids: Vec<GoalId>,
    pub warnings: Vec<DataWarning>,
}

pub fn closing_period_for(today: NaiveDate) -> MonthPeriod {
    MonthPeriod::from_date(today).previous()
}

/// The period a close started on `today` would target, or why there is
/// nothing to do.
pub fn check_closable(
    today: NaiveDate,
    sales: &[Sale],
    commissions: &[Commission],
) -> Result<MonthPeriod> {
    let period = closing_period_for(today);

    if !sales.iter().any(|s| period.contains(s.date)) {
        return Err(SalesEngineError::NothingToClose(period.to_string()));
    }

    let existing = commissions.iter().filter(|c| c.period == period).count();
    if existing > 0 {
        return Err(SalesEngineError::AlreadyClosed {
            period: period.to_string(),
            existing,
        });
    }

    Ok(period)
}

pub fn closable_period(
    today: NaiveDate,
    sales: &[Sale],
    commissions: &[Commission],
) -> Option<MonthPeriod> {
    check_closable(today, sales, commissions).ok()
}

fn rolls_over(goal: &Goal, period: MonthPeriod) -> bool {
    goal.period == Period::Month(period)
        && goal.recurring
        && goal.kind == GoalKind::Monthly
        && goal.status == GoalStatus::Active
}

pub fn compute_month_close(
    snapshot: &SalesSnapshot,
    closing_period: MonthPeriod,
    overrides: &ClosingOverrides,
    now: DateTime<Utc>,
    ids: &mut IdSequence,
) -> Result<MonthCloseOutcome> {
    overrides.validate()?;

    let next_period = closing_period.next();
    let calculator = CommissionCalculator::new(&snapshot.payment_methods);
    let mut warnings = Vec::new();

    let sellers: BTreeSet<CollaboratorId> = snapshot
        .sales
        .iter()
        .filter(|s| closing_period.contains(s.date))
        .map(|s| s.collaborator_id)
        .collect();

    let mut new_commissions = Vec::with_capacity(sellers.len());
    for collaborator_id in sellers {
        let sales: Vec<&Sale> = snapshot
            .sales
            .iter()
            .filter(|s| s.collaborator_id == collaborator_id && closing_period.contains(s.date))
            .collect();

        if snapshot.collaborator(collaborator_id).is_none() {
            if let Some(first) = sales.first() {
                warnings.push(DataWarning::UnknownCollaborator {
                    sale_id: first.id,
                    collaborator_id,
                });
            }
        }

        let result = calculator.breakdown(sales.iter().copied());
        warnings.extend(result.warnings);

        let commission = Commission {
            id: ids.commission()?,
            collaborator_id,
            period: closing_period,
            total_commission: result.total_commission,
            status: CommissionStatus::Pending,
            calculated_at: now,
            approval: None,
            breakdown: result.entries,
        };
        debug!(
            "Commission #{} for collaborator #{}: {:.2} over {} sales",
            commission.id,
            collaborator_id,
            commission.total_commission,
            sales.len()
        );
        new_commissions.push(commission);
    }

    // Pick the goals to roll from the untouched snapshot so successors are
    // never considered in the same pass.
    let rolling: Vec<&Goal> = snapshot
        .goals
        .iter()
        .filter(|g| rolls_over(g, closing_period))
        .collect();
    let completed_goal_ids: Vec<GoalId> = rolling.iter().map(|g| g.id).collect();

    let successors: Vec<Goal> = rolling
        .iter()
        .map(|goal| {
            Ok(Goal {
                id: ids.goal()?,
                period: Period::Month(next_period),
                target_amount: overrides.target_for(goal),
                status: GoalStatus::Active,
                ..(*goal).clone()
            })
        })
        .collect::<Result<_>>()?;
    let created_goal_ids: Vec<GoalId> = successors.iter().map(|g| g.id).collect();

    let mut goals: Vec<Goal> = snapshot
        .goals
        .iter()
        .map(|goal| {
            if completed_goal_ids.contains(&goal.id) {
                Goal {
                    status: GoalStatus::Completed,
                    ..goal.clone()
                }
            } else {
                goal.clone()
            }
        })
        .collect();
    goals.extend(successors);

    info!(
        "Closed {}: {} commissions created, {} recurring goals rolled into {}",
        closing_period,
        new_commissions.len(),
        created_goal_ids.len(),
        next_period
    );

    Ok(MonthCloseOutcome {
        closing_period,
        next_period,
        new_commissions,
        goals,
        completed_goal_ids,
        created_goal_ids,
        warnings,
    })
}

/// Closes the month before `request.now`, refusing with `NothingToClose` or
/// `AlreadyClosed` instead of producing duplicates.
pub fn close_month(snapshot: &SalesSnapshot, request: &ClosingRequest) -> Result<MonthCloseOutcome> {
    let closing_period = check_closable(
        request.now.date_naive(),
        &snapshot.sales,
        &snapshot.commissions,
    )?;
    let mut ids = IdSequence::after(snapshot);

    compute_month_close(
        snapshot,
        closing_period,
        &request.overrides,
        request.now,
        &mut ids,
    )
}
