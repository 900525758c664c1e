use crate::commission::{find_method, CommissionCalculator, UNKNOWN_METHOD_NAME};
use crate::config::EngineConfig;
use crate::error::DataWarning;
use crate::period::{ActivePeriod, MonthPeriod, Period};
use crate::schema::*;
use crate::utils::attainment_percentage;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollaboratorSummary {
    pub collaborator_id: CollaboratorId,
    pub name: String,
    pub team_id: Option<TeamId>,
    pub sales_count: usize,
    pub sold: f64,
    pub commission: f64,
    /// Sum of the collaborator's monthly goals in the period.
    pub goal_target: f64,
    pub attainment_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamSummary {
    pub team_id: TeamId,
    pub name: String,
    pub member_count: usize,
    pub sales_count: usize,
    pub sold: f64,
    pub commission: f64,
    pub goal_target: f64,
    pub attainment_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethodSummary {
    pub code: String,
    pub name: String,
    pub commission_percentage: f64,
    pub active: bool,
    pub sales_count: usize,
    pub sales_total: f64,
    pub commission: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalProgress {
    pub goal_id: GoalId,
    pub target: GoalTarget,
    pub period: Period,
    pub kind: GoalKind,
    pub target_amount: f64,
    /// Sales over the goal's own period (the whole year for annual goals).
    pub achieved: f64,
    pub attainment_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OverviewKpis {
    pub total_sales_count: usize,
    pub total_sales_amount: f64,
    pub total_commission: f64,
    pub average_ticket: f64,
    pub collaborators_on_target: usize,
    /// Collaborators without a monthly goal are not counted as lagging.
    pub collaborators_lagging: usize,
    pub active_goals: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardView {
    pub month_period: MonthPeriod,
    pub year_period: i32,
    pub collaborators: Vec<CollaboratorSummary>,
    pub teams: Vec<TeamSummary>,
    pub payment_methods: Vec<PaymentMethodSummary>,
    pub goals: Vec<GoalProgress>,
    pub kpis: OverviewKpis,
    pub warnings: Vec<DataWarning>,
}

impl DashboardView {
    pub fn collaborator(&self, id: CollaboratorId) -> Option<&CollaboratorSummary> {
        self.collaborators.iter().find(|c| c.collaborator_id == id)
    }

    pub fn team(&self, id: TeamId) -> Option<&TeamSummary> {
        self.teams.iter().find(|t| t.team_id == id)
    }

    /// Only methods currently offered; what commission-rate displays show.
    pub fn active_payment_methods(&self) -> impl Iterator<Item = &PaymentMethodSummary> {
        self.payment_methods.iter().filter(|m| m.active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommissionPreview {
    pub collaborator_id: CollaboratorId,
    pub collaborator_name: Option<String>,
    pub period: MonthPeriod,
    pub breakdown: Vec<CommissionBreakdown>,
    pub total_commission: f64,
}

/// Read-only reporting over a snapshot. Nothing here mutates or persists.
pub struct Aggregator {
    on_target_percentage: f64,
    lagging_percentage: f64,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Aggregator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            on_target_percentage: config.on_target_percentage,
            lagging_percentage: config.lagging_percentage,
        }
    }

    pub fn build_dashboard(&self, snapshot: &SalesSnapshot, active: &ActivePeriod) -> DashboardView {
        info!(
            "Building dashboard for {} ({} sales, {} goals)",
            active.month_period,
            snapshot.sales.len(),
            snapshot.goals.len()
        );

        let calculator = CommissionCalculator::new(&snapshot.payment_methods);
        let period_sales: Vec<&Sale> = snapshot
            .sales
            .iter()
            .filter(|s| active.contains_date(s.date))
            .collect();

        let mut warnings = Vec::new();
        for sale in &period_sales {
            if find_method(&sale.payment_method_code, &snapshot.payment_methods).is_none() {
                warnings.push(DataWarning::UnknownPaymentMethod {
                    sale_id: sale.id,
                    code: sale.payment_method_code.clone(),
                });
            }
            if snapshot.collaborator(sale.collaborator_id).is_none() {
                warnings.push(DataWarning::UnknownCollaborator {
                    sale_id: sale.id,
                    collaborator_id: sale.collaborator_id,
                });
            }
        }

        let period_goals: Vec<&Goal> = snapshot
            .goals
            .iter()
            .filter(|g| g.status != GoalStatus::Cancelled && active.matches_period(&g.period))
            .collect();

        for goal in &period_goals {
            if !snapshot.goal_target_exists(&goal.target) {
                warnings.push(DataWarning::UnknownGoalTarget { goal_id: goal.id });
            }
        }

        let collaborators =
            self.summarize_collaborators(snapshot, &period_sales, &period_goals, &calculator);
        let teams = self.summarize_teams(snapshot, &collaborators, &period_goals);
        let payment_methods = self.summarize_payment_methods(snapshot, &period_sales, &calculator);
        let goals = self.goal_progress(snapshot, &period_goals);
        let kpis = self.overview(&period_sales, &period_goals, &collaborators, &calculator);

        if !warnings.is_empty() {
            debug!(
                "Dashboard for {} produced {} data warnings",
                active.month_period,
                warnings.len()
            );
        }

        DashboardView {
            month_period: active.month_period,
            year_period: active.year_period,
            collaborators,
            teams,
            payment_methods,
            goals,
            kpis,
            warnings,
        }
    }

    fn summarize_collaborators(
        &self,
        snapshot: &SalesSnapshot,
        period_sales: &[&Sale],
        period_goals: &[&Goal],
        calculator: &CommissionCalculator,
    ) -> Vec<CollaboratorSummary> {
        snapshot
            .collaborators
            .iter()
            .filter_map(|c| {
                let sales: Vec<&Sale> = period_sales
                    .iter()
                    .copied()
                    .filter(|s| s.collaborator_id == c.id)
                    .collect();

                // Inactive collaborators only show up when they sold something
                if !c.is_active() && sales.is_empty() {
                    return None;
                }

                let sold: f64 = sales.iter().map(|s| s.amount).sum();
                let commission: f64 = sales.iter().map(|s| calculator.commission_for(s)).sum();
                let goal_target: f64 = period_goals
                    .iter()
                    .filter(|g| g.kind == GoalKind::Monthly && g.is_individual_for(c.id))
                    .map(|g| g.target_amount)
                    .sum();

                Some(CollaboratorSummary {
                    collaborator_id: c.id,
                    name: c.name.clone(),
                    team_id: c.team_id,
                    sales_count: sales.len(),
                    sold,
                    commission,
                    goal_target,
                    attainment_percentage: attainment_percentage(sold, goal_target),
                })
            })
            .collect()
    }

    fn summarize_teams(
        &self,
        snapshot: &SalesSnapshot,
        collaborators: &[CollaboratorSummary],
        period_goals: &[&Goal],
    ) -> Vec<TeamSummary> {
        snapshot
            .teams
            .iter()
            .map(|team| {
                let members: Vec<&CollaboratorSummary> = collaborators
                    .iter()
                    .filter(|c| c.team_id == Some(team.id))
                    .collect();

                let sold: f64 = members.iter().map(|m| m.sold).sum();
                let goal_target: f64 = period_goals
                    .iter()
                    .filter(|g| g.kind == GoalKind::Monthly && g.is_team_goal_for(team.id))
                    .map(|g| g.target_amount)
                    .sum();

                TeamSummary {
                    team_id: team.id,
                    name: team.name.clone(),
                    member_count: snapshot.team_members(team.id).count(),
                    sales_count: members.iter().map(|m| m.sales_count).sum(),
                    sold,
                    commission: members.iter().map(|m| m.commission).sum(),
                    goal_target,
                    attainment_percentage: attainment_percentage(sold, goal_target),
                }
            })
            .collect()
    }

    fn summarize_payment_methods(
        &self,
        snapshot: &SalesSnapshot,
        period_sales: &[&Sale],
        calculator: &CommissionCalculator,
    ) -> Vec<PaymentMethodSummary> {
        let mut by_code: BTreeMap<&str, (usize, f64, f64)> = BTreeMap::new();
        for sale in period_sales {
            let entry = by_code
                .entry(sale.payment_method_code.as_str())
                .or_default();
            entry.0 += 1;
            entry.1 += sale.amount;
            entry.2 += calculator.commission_for(sale);
        }

        let mut summaries: Vec<PaymentMethodSummary> = snapshot
            .payment_methods
            .iter()
            .filter_map(|method| {
                let (count, total, commission) = by_code
                    .remove(method.code.as_str())
                    .unwrap_or_default();

                if !method.active && count == 0 {
                    return None;
                }

                Some(PaymentMethodSummary {
                    code: method.code.clone(),
                    name: method.name.clone(),
                    commission_percentage: method.commission_percentage,
                    active: method.active,
                    sales_count: count,
                    sales_total: total,
                    commission,
                })
            })
            .collect();

        // Whatever is left references methods that no longer exist
        summaries.extend(by_code.into_iter().map(|(code, (count, total, _))| {
            PaymentMethodSummary {
                code: code.to_string(),
                name: UNKNOWN_METHOD_NAME.to_string(),
                commission_percentage: 0.0,
                active: false,
                sales_count: count,
                sales_total: total,
                commission: 0.0,
            }
        }));

        summaries
    }

    fn goal_progress(&self, snapshot: &SalesSnapshot, period_goals: &[&Goal]) -> Vec<GoalProgress> {
        period_goals
            .iter()
            .map(|goal| {
                let achieved: f64 = snapshot
                    .sales
                    .iter()
                    .filter(|s| goal.period.contains(s.date))
                    .filter(|s| match goal.target {
                        GoalTarget::Individual(id) => s.collaborator_id == id,
                        GoalTarget::Team(team_id) => snapshot
                            .collaborator(s.collaborator_id)
                            .is_some_and(|c| c.team_id == Some(team_id)),
                    })
                    .map(|s| s.amount)
                    .sum();

                GoalProgress {
                    goal_id: goal.id,
                    target: goal.target,
                    period: goal.period,
                    kind: goal.kind,
                    target_amount: goal.target_amount,
                    achieved,
                    attainment_percentage: attainment_percentage(achieved, goal.target_amount),
                }
            })
            .collect()
    }

    fn overview(
        &self,
        period_sales: &[&Sale],
        period_goals: &[&Goal],
        collaborators: &[CollaboratorSummary],
        calculator: &CommissionCalculator,
    ) -> OverviewKpis {
        let total_sales_count = period_sales.len();
        let total_sales_amount: f64 = period_sales.iter().map(|s| s.amount).sum();
        let average_ticket = if total_sales_count > 0 {
            total_sales_amount / total_sales_count as f64
        } else {
            0.0
        };

        let with_goal = || collaborators.iter().filter(|c| c.goal_target > 0.0);

        OverviewKpis {
            total_sales_count,
            total_sales_amount,
            total_commission: period_sales.iter().map(|s| calculator.commission_for(s)).sum(),
            average_ticket,
            collaborators_on_target: with_goal()
                .filter(|c| c.attainment_percentage >= self.on_target_percentage)
                .count(),
            collaborators_lagging: with_goal()
                .filter(|c| c.attainment_percentage < self.lagging_percentage)
                .count(),
            active_goals: period_goals
                .iter()
                .filter(|g| g.status == GoalStatus::Active)
                .count(),
        }
    }
}

pub fn build_dashboard(snapshot: &SalesSnapshot, active: &ActivePeriod) -> DashboardView {
    Aggregator::default().build_dashboard(snapshot, active)
}

/// What the month close would persist for `active.month_period` if it ran
/// now: one entry per collaborator with at least one sale in the window.
pub fn build_commission_preview(
    sales: &[Sale],
    collaborators: &[Collaborator],
    methods: &[PaymentMethod],
    active: &ActivePeriod,
) -> Vec<CommissionPreview> {
    let calculator = CommissionCalculator::new(methods);

    let sellers: BTreeSet<CollaboratorId> = sales
        .iter()
        .filter(|s| active.contains_date(s.date))
        .map(|s| s.collaborator_id)
        .collect();

    sellers
        .into_iter()
        .map(|collaborator_id| {
            let result = calculator.breakdown(
                sales
                    .iter()
                    .filter(|s| s.collaborator_id == collaborator_id && active.contains_date(s.date)),
            );

            CommissionPreview {
                collaborator_id,
                collaborator_name: collaborators
                    .iter()
                    .find(|c| c.id == collaborator_id)
                    .map(|c| c.name.clone()),
                period: active.month_period,
                breakdown: result.entries,
                total_commission: result.total_commission,
            }
        })
        .collect()
}
