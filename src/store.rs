use crate::approval;
use crate::closing::{self, ClosingRequest, MonthCloseOutcome};
use crate::config::EngineConfig;
use crate::engine::{build_commission_preview, Aggregator, CommissionPreview, DashboardView};
use crate::error::{Result, SalesEngineError};
use crate::ingestion::{ingest_sale_rows, IngestionReport, SaleRow};
use crate::integrity::{IntegrityChecker, VerificationResult};
use crate::notifications::{dispatch_notifications, DomainEvent, NotificationSink, ThresholdEvaluator};
use crate::overrides::ClosingOverrides;
use crate::period::{ActivePeriod, MonthPeriod, Period, ViewMode};
use crate::schema::*;
use crate::statement::CommissionStatement;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use log::{debug, info};

#[derive(Debug, Clone)]
pub struct NewCollaborator {
    pub name: String,
    pub role: CollaboratorRole,
    pub team_id: Option<TeamId>,
}

#[derive(Debug, Clone)]
pub struct NewGoal {
    pub target: GoalTarget,
    pub period: Period,
    pub target_amount: f64,
    pub recurring: bool,
}

#[derive(Debug, Clone)]
pub struct NewSale {
    pub collaborator_id: CollaboratorId,
    pub client_name: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub payment_method_code: String,
    pub status: SaleStatus,
}

/// Owns every collection for one session. Writes replace whole records by
/// identity; reads hand out borrowed snapshots to the pure engine functions.
#[derive(Debug, Clone)]
pub struct SalesStore {
    data: SalesSnapshot,
    config: EngineConfig,
    ids: IdSequence,
    simulated_date: NaiveDate,
    view: ViewMode,
    outbox: Vec<DomainEvent>,
}

impl SalesStore {
    pub fn new(config: EngineConfig, simulated_date: NaiveDate) -> Self {
        Self::from_snapshot(SalesSnapshot::default(), config, simulated_date)
    }

    pub fn from_snapshot(
        snapshot: SalesSnapshot,
        config: EngineConfig,
        simulated_date: NaiveDate,
    ) -> Self {
        info!(
            "Loading store: {} collaborators, {} sales, {} goals, {} commissions",
            snapshot.collaborators.len(),
            snapshot.sales.len(),
            snapshot.goals.len(),
            snapshot.commissions.len()
        );

        Self {
            ids: IdSequence::after(&snapshot),
            data: snapshot,
            config,
            simulated_date,
            view: ViewMode::Live,
            outbox: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> &SalesSnapshot {
        &self.data
    }

    pub fn into_snapshot(self) -> SalesSnapshot {
        self.data
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn simulated_date(&self) -> NaiveDate {
        self.simulated_date
    }

    pub fn set_simulated_date(&mut self, date: NaiveDate) {
        debug!("Simulated date moved to {}", date);
        self.simulated_date = date;
    }

    fn now(&self) -> DateTime<Utc> {
        self.simulated_date.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn view(&self) -> &ViewMode {
        &self.view
    }

    pub fn set_view(&mut self, view: ViewMode) {
        self.view = view;
    }

    pub fn active_period(&self) -> ActivePeriod {
        ActivePeriod::resolve(&self.view, self.simulated_date)
    }

    pub fn add_team(&mut self, name: &str) -> Result<TeamId> {
        if name.trim().is_empty() {
            return Err(SalesEngineError::validation("Team", "name must not be empty"));
        }
        let id = self.ids.team()?;
        self.data.teams.push(Team {
            id,
            name: name.trim().to_string(),
        });
        Ok(id)
    }

    pub fn add_collaborator(&mut self, new: NewCollaborator) -> Result<CollaboratorId> {
        if new.name.trim().is_empty() {
            return Err(SalesEngineError::validation(
                "Collaborator",
                "name must not be empty",
            ));
        }
        if let Some(team_id) = new.team_id {
            self.data.team(team_id).ok_or(SalesEngineError::NotFound {
                entity: "Team",
                id: team_id,
            })?;
        }

        let id = self.ids.collaborator()?;
        self.data.collaborators.push(Collaborator {
            id,
            name: new.name.trim().to_string(),
            role: new.role,
            team_id: new.team_id,
            status: CollaboratorStatus::Active,
        });
        Ok(id)
    }

    pub fn set_collaborator_status(
        &mut self,
        id: CollaboratorId,
        status: CollaboratorStatus,
    ) -> Result<()> {
        let collaborator = self
            .data
            .collaborators
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(SalesEngineError::NotFound {
                entity: "Collaborator",
                id,
            })?;
        *collaborator = Collaborator {
            status,
            ..collaborator.clone()
        };
        Ok(())
    }

    /// Codes are stored upper-cased and must be unique.
    pub fn add_payment_method(
        &mut self,
        code: &str,
        name: &str,
        commission_percentage: f64,
    ) -> Result<PaymentMethodId> {
        let code = code.trim().to_uppercase();
        if self.data.payment_methods.iter().any(|m| m.code == code) {
            return Err(SalesEngineError::DuplicatePaymentMethod(code));
        }

        let method = PaymentMethod {
            id: self.ids.payment_method()?,
            code,
            name: name.trim().to_string(),
            commission_percentage,
            active: true,
        };
        method.validate()?;

        let id = method.id;
        self.data.payment_methods.push(method);
        Ok(id)
    }

    pub fn set_payment_method_active(&mut self, id: PaymentMethodId, active: bool) -> Result<()> {
        let method = self
            .data
            .payment_methods
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(SalesEngineError::NotFound {
                entity: "PaymentMethod",
                id,
            })?;
        *method = PaymentMethod {
            active,
            ..method.clone()
        };
        Ok(())
    }

    pub fn add_goal(&mut self, new: NewGoal) -> Result<GoalId> {
        if !self.data.goal_target_exists(&new.target) {
            let (entity, id) = match new.target {
                GoalTarget::Individual(id) => ("Collaborator", id),
                GoalTarget::Team(id) => ("Team", id),
            };
            return Err(SalesEngineError::NotFound { entity, id });
        }

        let goal = Goal {
            id: 0,
            target: new.target,
            period: new.period,
            target_amount: new.target_amount,
            kind: match new.period {
                Period::Month(_) => GoalKind::Monthly,
                Period::Year(_) => GoalKind::Annual,
            },
            recurring: new.recurring,
            status: GoalStatus::Active,
        };
        goal.validate()?;

        let goal = Goal {
            id: self.ids.goal()?,
            ..goal
        };
        let id = goal.id;
        self.data.goals.push(goal);
        Ok(id)
    }

    pub fn cancel_goal(&mut self, id: GoalId) -> Result<()> {
        let goal = self
            .data
            .goals
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(SalesEngineError::NotFound { entity: "Goal", id })?;
        *goal = Goal {
            status: GoalStatus::Cancelled,
            ..goal.clone()
        };
        Ok(())
    }

    /// Validates and appends a sale, then queues a `SaleRecorded` event.
    pub fn record_sale(&mut self, new: NewSale) -> Result<SaleId> {
        if self.data.collaborator(new.collaborator_id).is_none() {
            return Err(SalesEngineError::NotFound {
                entity: "Collaborator",
                id: new.collaborator_id,
            });
        }
        if new.client_name.trim().is_empty() {
            return Err(SalesEngineError::validation(
                "Sale",
                "client name must not be empty",
            ));
        }

        let sale = Sale {
            id: 0,
            collaborator_id: new.collaborator_id,
            client_name: new.client_name.trim().to_string(),
            amount: new.amount,
            date: new.date,
            payment_method_code: new.payment_method_code.trim().to_uppercase(),
            status: new.status,
        };
        sale.validate(&self.data.payment_methods)?;

        let sale = Sale {
            id: self.ids.sale()?,
            ..sale
        };
        let id = sale.id;
        debug!(
            "Recorded sale #{} of {:.2} for collaborator #{}",
            id, sale.amount, sale.collaborator_id
        );
        self.outbox.push(DomainEvent::SaleRecorded { sale: sale.clone() });
        self.data.sales.push(sale);
        Ok(id)
    }

    /// Appends every accepted row as a recorded sale.
    pub fn import_sales(&mut self, rows: &[SaleRow]) -> IngestionReport {
        let report = ingest_sale_rows(
            rows,
            &self.data.collaborators,
            &self.data.payment_methods,
            &mut self.ids,
        );

        for sale in &report.sales {
            self.outbox.push(DomainEvent::SaleRecorded { sale: sale.clone() });
        }
        self.data.sales.extend(report.sales.iter().cloned());
        report
    }

    pub fn pending_events(&self) -> &[DomainEvent] {
        &self.outbox
    }

    pub fn drain_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Drains the outbox through the threshold evaluator into `sink`.
    pub fn dispatch_notifications(&mut self, sink: &mut dyn NotificationSink) -> usize {
        let events = self.drain_events();
        if !self.config.notifications_enabled {
            debug!("Notifications disabled, dropping {} events", events.len());
            return 0;
        }
        let evaluator = ThresholdEvaluator::from_config(&self.config);
        dispatch_notifications(&events, &self.data, &evaluator, sink)
    }

    pub fn dashboard(&self) -> DashboardView {
        Aggregator::new(&self.config).build_dashboard(&self.data, &self.active_period())
    }

    pub fn commission_preview(&self) -> Vec<CommissionPreview> {
        build_commission_preview(
            &self.data.sales,
            &self.data.collaborators,
            &self.data.payment_methods,
            &self.active_period(),
        )
    }

    fn replace_commission(
        &mut self,
        id: CommissionId,
        transition: impl FnOnce(&Commission) -> Result<Commission>,
    ) -> Result<&Commission> {
        let index = self
            .data
            .commissions
            .iter()
            .position(|c| c.id == id)
            .ok_or(SalesEngineError::NotFound {
                entity: "Commission",
                id,
            })?;

        let updated = transition(&self.data.commissions[index])?;
        self.data.commissions[index] = updated;
        Ok(&self.data.commissions[index])
    }

    pub fn approve_commission(
        &mut self,
        id: CommissionId,
        approver_id: CollaboratorId,
        notes: Option<&str>,
    ) -> Result<&Commission> {
        let now = self.now();
        self.replace_commission(id, |c| approval::approve(c, approver_id, notes, now))
    }

    pub fn reject_commission(
        &mut self,
        id: CommissionId,
        approver_id: CollaboratorId,
        notes: &str,
    ) -> Result<&Commission> {
        let now = self.now();
        self.replace_commission(id, |c| approval::reject(c, approver_id, notes, now))
    }

    pub fn mark_commission_paid(&mut self, id: CommissionId) -> Result<&Commission> {
        self.replace_commission(id, approval::mark_paid)
    }

    pub fn closable_period(&self) -> Option<MonthPeriod> {
        closing::closable_period(
            self.simulated_date,
            &self.data.sales,
            &self.data.commissions,
        )
    }

    /// Closes last month, commits the new commissions and goals, and switches
    /// the view to the closed month so it can be reviewed.
    pub fn close_month(&mut self, overrides: ClosingOverrides) -> Result<MonthCloseOutcome> {
        let request = ClosingRequest::new(self.now()).with_overrides(overrides);
        let closing_period = closing::check_closable(
            self.simulated_date,
            &self.data.sales,
            &self.data.commissions,
        )?;

        let mut ids = self.ids.clone();
        let outcome = closing::compute_month_close(
            &self.data,
            closing_period,
            &request.overrides,
            request.now,
            &mut ids,
        )?;

        self.ids = ids;
        self.data
            .commissions
            .extend(outcome.new_commissions.iter().cloned());
        self.data.goals = outcome.goals.clone();
        self.view = ViewMode::Period {
            selected: outcome.closing_period,
        };

        Ok(outcome)
    }

    pub fn commission_statement(&self, period: MonthPeriod) -> CommissionStatement {
        CommissionStatement::from_snapshot(&self.data, period)
    }

    pub fn verify_integrity(&self, tolerance: f64) -> VerificationResult {
        IntegrityChecker::new(&self.data).verify(tolerance)
    }
}
