use crate::error::{DataWarning, Result, SalesEngineError};
use crate::period::MonthPeriod;
use crate::schema::*;
use crate::utils::approx_eq;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityViolation {
    CommissionMismatch {
        commission_id: CommissionId,
        total: f64,
        breakdown_sum: f64,
    },
    DuplicateCommission {
        collaborator_id: CollaboratorId,
        period: MonthPeriod,
        commission_ids: Vec<CommissionId>,
    },
    NonPositiveSale {
        sale_id: SaleId,
        amount: f64,
    },
    PercentageOutOfRange {
        code: String,
        percentage: f64,
    },
    DuplicatePaymentCode {
        code: String,
    },
    InvalidGoal {
        goal_id: GoalId,
        details: String,
    },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityViolation::CommissionMismatch {
                commission_id,
                total,
                breakdown_sum,
            } => write!(
                f,
                "commission #{} totals {:.2} but its breakdown sums to {:.2}",
                commission_id, total, breakdown_sum
            ),
            IntegrityViolation::DuplicateCommission {
                collaborator_id,
                period,
                commission_ids,
            } => write!(
                f,
                "collaborator #{} has {} commissions for {}",
                collaborator_id,
                commission_ids.len(),
                period
            ),
            IntegrityViolation::NonPositiveSale { sale_id, amount } => {
                write!(f, "sale #{} has non-positive amount {}", sale_id, amount)
            }
            IntegrityViolation::PercentageOutOfRange { code, percentage } => write!(
                f,
                "payment method '{}' has percentage {} outside 0-100",
                code, percentage
            ),
            IntegrityViolation::DuplicatePaymentCode { code } => {
                write!(f, "payment method code '{}' is used more than once", code)
            }
            IntegrityViolation::InvalidGoal { goal_id, details } => {
                write!(f, "goal #{}: {}", goal_id, details)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub violations: Vec<IntegrityViolation>,
    /// Dangling references. Reports still work around these.
    pub warnings: Vec<DataWarning>,
}

impl VerificationResult {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Fails with `CommissionMismatch` when the stored total drifts from its
/// breakdown by more than `tolerance`.
pub fn verify_commission(commission: &Commission, tolerance: f64) -> Result<()> {
    let breakdown_sum = commission.breakdown_sum();
    if approx_eq(commission.total_commission, breakdown_sum, tolerance) {
        Ok(())
    } else {
        Err(SalesEngineError::CommissionMismatch {
            commission_id: commission.id,
            total: commission.total_commission,
            breakdown_sum,
        })
    }
}

pub struct IntegrityChecker<'a> {
    snapshot: &'a SalesSnapshot,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(snapshot: &'a SalesSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn verify(&self, tolerance: f64) -> VerificationResult {
        let mut result = VerificationResult::default();

        self.check_commissions(tolerance, &mut result);
        self.check_payment_methods(&mut result);
        self.check_sales(&mut result);
        self.check_goals(&mut result);

        for violation in &result.violations {
            warn!("Integrity violation: {}", violation);
        }
        info!(
            "Integrity check finished: {} violations, {} warnings",
            result.violations.len(),
            result.warnings.len()
        );

        result
    }

    fn check_commissions(&self, tolerance: f64, result: &mut VerificationResult) {
        let mut by_owner: BTreeMap<(CollaboratorId, MonthPeriod), Vec<CommissionId>> =
            BTreeMap::new();

        for commission in &self.snapshot.commissions {
            if let Err(SalesEngineError::CommissionMismatch {
                commission_id,
                total,
                breakdown_sum,
            }) = verify_commission(commission, tolerance)
            {
                result.violations.push(IntegrityViolation::CommissionMismatch {
                    commission_id,
                    total,
                    breakdown_sum,
                });
            }

            by_owner
                .entry((commission.collaborator_id, commission.period))
                .or_default()
                .push(commission.id);
        }

        for ((collaborator_id, period), commission_ids) in by_owner {
            if commission_ids.len() > 1 {
                result.violations.push(IntegrityViolation::DuplicateCommission {
                    collaborator_id,
                    period,
                    commission_ids,
                });
            }
        }
    }

    fn check_payment_methods(&self, result: &mut VerificationResult) {
        let mut seen = BTreeSet::new();

        for method in &self.snapshot.payment_methods {
            if !seen.insert(method.code.as_str()) {
                result.violations.push(IntegrityViolation::DuplicatePaymentCode {
                    code: method.code.clone(),
                });
            }
            if !(0.0..=100.0).contains(&method.commission_percentage) {
                result.violations.push(IntegrityViolation::PercentageOutOfRange {
                    code: method.code.clone(),
                    percentage: method.commission_percentage,
                });
            }
        }
    }

    fn check_sales(&self, result: &mut VerificationResult) {
        for sale in &self.snapshot.sales {
            if !sale.amount.is_finite() || sale.amount <= 0.0 {
                result.violations.push(IntegrityViolation::NonPositiveSale {
                    sale_id: sale.id,
                    amount: sale.amount,
                });
            }
            if self.snapshot.collaborator(sale.collaborator_id).is_none() {
                result.warnings.push(DataWarning::UnknownCollaborator {
                    sale_id: sale.id,
                    collaborator_id: sale.collaborator_id,
                });
            }
            if !self
                .snapshot
                .payment_methods
                .iter()
                .any(|m| m.code == sale.payment_method_code)
            {
                result.warnings.push(DataWarning::UnknownPaymentMethod {
                    sale_id: sale.id,
                    code: sale.payment_method_code.clone(),
                });
            }
        }
    }

    fn check_goals(&self, result: &mut VerificationResult) {
        for goal in &self.snapshot.goals {
            if let Err(e) = goal.validate() {
                result.violations.push(IntegrityViolation::InvalidGoal {
                    goal_id: goal.id,
                    details: e.to_string(),
                });
            }
            if !self.snapshot.goal_target_exists(&goal.target) {
                result
                    .warnings
                    .push(DataWarning::UnknownGoalTarget { goal_id: goal.id });
            }
        }
    }
}
