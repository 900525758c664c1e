//! Goal-threshold notifications.
//!
//! Recording a sale only emits a [`DomainEvent`]. The [`ThresholdEvaluator`]
//! decides afterwards whether the sale pushed its seller across the trigger
//! percentage, and [`dispatch_notifications`] hands the resulting signals to
//! a host-provided [`NotificationSink`]. Delivery is best effort.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::period::{MonthPeriod, Period};
use crate::schema::{CollaboratorId, Goal, GoalKind, GoalStatus, Sale, SalesSnapshot};
use crate::utils::attainment_percentage;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    SaleRecorded { sale: Sale },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalThresholdCrossed {
    pub collaborator_id: CollaboratorId,
    pub period: MonthPeriod,
    pub attainment_percentage: f64,
}

/// Outbound delivery (webhook, chat message, ...) lives with the host.
pub trait NotificationSink {
    fn deliver(&mut self, signal: &GoalThresholdCrossed) -> Result<()>;
}

pub struct ThresholdEvaluator {
    trigger_percentage: f64,
}

impl ThresholdEvaluator {
    pub fn new(trigger_percentage: f64) -> Self {
        Self { trigger_percentage }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.notification_trigger_percentage)
    }

    pub fn trigger_percentage(&self) -> f64 {
        self.trigger_percentage
    }

    /// `sales` must already contain `sale`. Fires only on the sale that moves
    /// the seller from below the trigger to at or above it.
    pub fn evaluate(
        &self,
        sale: &Sale,
        sales: &[Sale],
        goals: &[Goal],
    ) -> Option<GoalThresholdCrossed> {
        let period = MonthPeriod::from_date(sale.date);
        let target: f64 = goals
            .iter()
            .filter(|g| {
                g.is_individual_for(sale.collaborator_id)
                    && g.kind == GoalKind::Monthly
                    && g.status == GoalStatus::Active
                    && g.period == Period::Month(period)
            })
            .map(|g| g.target_amount)
            .sum();

        if target <= 0.0 {
            return None;
        }

        let cumulative: f64 = sales
            .iter()
            .filter(|s| s.collaborator_id == sale.collaborator_id && period.contains(s.date))
            .map(|s| s.amount)
            .sum();
        let before = cumulative - sale.amount;

        let previous_ratio = before / target * 100.0;
        let current_ratio = cumulative / target * 100.0;

        if previous_ratio < self.trigger_percentage && current_ratio >= self.trigger_percentage {
            Some(GoalThresholdCrossed {
                collaborator_id: sale.collaborator_id,
                period,
                attainment_percentage: attainment_percentage(cumulative, target),
            })
        } else {
            None
        }
    }

    pub fn evaluate_events(
        &self,
        events: &[DomainEvent],
        snapshot: &SalesSnapshot,
    ) -> Vec<GoalThresholdCrossed> {
        events
            .iter()
            .filter_map(|event| match event {
                DomainEvent::SaleRecorded { sale } => {
                    // Judge each sale against the sales that existed when it was recorded
                    let history: Vec<Sale> = snapshot
                        .sales
                        .iter()
                        .filter(|s| s.id <= sale.id)
                        .cloned()
                        .collect();
                    self.evaluate(sale, &history, &snapshot.goals)
                }
            })
            .collect()
    }
}

/// Evaluates `events` and pushes every signal to `sink`. Failed deliveries
/// are logged and skipped. Returns how many signals were delivered.
pub fn dispatch_notifications(
    events: &[DomainEvent],
    snapshot: &SalesSnapshot,
    evaluator: &ThresholdEvaluator,
    sink: &mut dyn NotificationSink,
) -> usize {
    let signals = evaluator.evaluate_events(events, snapshot);
    let mut delivered = 0;

    for signal in &signals {
        match sink.deliver(signal) {
            Ok(()) => {
                debug!(
                    "Delivered goal threshold for collaborator #{} ({}%)",
                    signal.collaborator_id, signal.attainment_percentage
                );
                delivered += 1;
            }
            Err(e) => warn!(
                "Dropping goal threshold notification for collaborator #{}: {}",
                signal.collaborator_id, e
            ),
        }
    }

    delivered
}
