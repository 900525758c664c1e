use crate::error::{Result, SalesEngineError};
use crate::schema::{Goal, GoalId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Adjustments the administrator makes when closing a month.
/// Successor goals copy their predecessor unless told otherwise here.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct ClosingOverrides {
    #[schemars(
        description = "New target amount for the successor of a recurring goal, keyed by the id of the goal being closed."
    )]
    #[serde(default)]
    pub target_amounts: BTreeMap<GoalId, f64>,
}

impl ClosingOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, goal_id: GoalId, amount: f64) -> Self {
        self.target_amounts.insert(goal_id, amount);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.target_amounts.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        for (goal_id, amount) in &self.target_amounts {
            if !amount.is_finite() || *amount <= 0.0 {
                return Err(SalesEngineError::validation(
                    "ClosingOverrides",
                    format!(
                        "target amount for goal #{} must be positive, got {}",
                        goal_id, amount
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Target for the successor of `goal`.
    pub fn target_for(&self, goal: &Goal) -> f64 {
        self.target_amounts
            .get(&goal.id)
            .copied()
            .unwrap_or(goal.target_amount)
    }
}
