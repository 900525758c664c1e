use crate::schema::{CollaboratorId, CommissionId, CommissionStatus, GoalId, SaleId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SalesEngineError {
    #[error("Validation failed for {entity}: {details}")]
    ValidationError { entity: String, details: String },

    #[error("Invalid period '{0}': expected YYYY-MM or YYYY")]
    InvalidPeriod(String),

    #[error("Invalid amount {0}: must be greater than zero")]
    InvalidAmount(f64),

    #[error("Invalid commission percentage {0}: must be between 0 and 100")]
    InvalidPercentage(f64),

    #[error("Payment method code '{0}' already exists")]
    DuplicatePaymentMethod(String),

    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("Payment method '{0}' not found")]
    UnknownPaymentMethod(String),

    #[error("Commission #{commission_id} cannot be {action} while {from:?}")]
    InvalidTransition {
        commission_id: CommissionId,
        from: CommissionStatus,
        action: &'static str,
    },

    #[error("Nothing to close for period {0}: no sales recorded")]
    NothingToClose(String),

    #[error("Period {period} is already closed ({existing} commissions exist)")]
    AlreadyClosed { period: String, existing: usize },

    #[error("Commission #{commission_id} total {total} does not match breakdown sum {breakdown_sum}")]
    CommissionMismatch {
        commission_id: CommissionId,
        total: f64,
        breakdown_sum: f64,
    },

    #[error("Notification delivery failed: {0}")]
    DeliveryError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SalesEngineError {
    pub(crate) fn validation(entity: impl Into<String>, details: impl Into<String>) -> Self {
        Self::ValidationError {
            entity: entity.into(),
            details: details.into(),
        }
    }

    /// True for the "nothing to do" outcomes: the request was well formed but
    /// the current state does not allow it.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. } | Self::NothingToClose(_) | Self::AlreadyClosed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SalesEngineError>;

/// A dangling reference found while aggregating. The affected record is still
/// processed with a safe default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    /// Sale references a payment method code that no longer exists. Its
    /// commission resolves to zero.
    UnknownPaymentMethod { sale_id: SaleId, code: String },
    /// Sale belongs to a collaborator missing from the roster.
    UnknownCollaborator {
        sale_id: SaleId,
        collaborator_id: CollaboratorId,
    },
    /// Goal targets a collaborator or team missing from the roster.
    UnknownGoalTarget { goal_id: GoalId },
}

impl std::fmt::Display for DataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataWarning::UnknownPaymentMethod { sale_id, code } => write!(
                f,
                "Sale #{} uses unknown payment method '{}' (commission set to 0)",
                sale_id, code
            ),
            DataWarning::UnknownCollaborator {
                sale_id,
                collaborator_id,
            } => write!(
                f,
                "Sale #{} belongs to unknown collaborator #{}",
                sale_id, collaborator_id
            ),
            DataWarning::UnknownGoalTarget { goal_id } => {
                write!(f, "Goal #{} targets an unknown collaborator or team", goal_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_classification() {
        let err = SalesEngineError::InvalidTransition {
            commission_id: 3,
            from: CommissionStatus::Paid,
            action: "approved",
        };
        assert!(err.is_precondition());
        assert!(err.to_string().contains("#3"));

        assert!(SalesEngineError::NothingToClose("2025-08".to_string()).is_precondition());
        assert!(!SalesEngineError::InvalidAmount(0.0).is_precondition());
        assert!(!SalesEngineError::validation("Commission", "notes required").is_precondition());
    }

    #[test]
    fn test_warning_display() {
        let warning = DataWarning::UnknownPaymentMethod {
            sale_id: 9,
            code: "BOLETO".to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "Sale #9 uses unknown payment method 'BOLETO' (commission set to 0)"
        );
    }
}
