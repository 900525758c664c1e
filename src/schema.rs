use crate::error::{Result, SalesEngineError};
use crate::period::{MonthPeriod, Period};
use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub type CollaboratorId = u64;
pub type TeamId = u64;
pub type PaymentMethodId = u64;
pub type GoalId = u64;
pub type SaleId = u64;
pub type CommissionId = u64;

/// Hands out fresh ids per collection, continuing after the largest id
/// already present. A counter is `None` once the id space is used up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSequence {
    next_collaborator: Option<u64>,
    next_team: Option<u64>,
    next_payment_method: Option<u64>,
    next_goal: Option<u64>,
    next_sale: Option<u64>,
    next_commission: Option<u64>,
}

impl Default for IdSequence {
    fn default() -> Self {
        Self {
            next_collaborator: Some(1),
            next_team: Some(1),
            next_payment_method: Some(1),
            next_goal: Some(1),
            next_sale: Some(1),
            next_commission: Some(1),
        }
    }
}

impl IdSequence {
    pub fn after(snapshot: &SalesSnapshot) -> Self {
        fn next<T>(items: &[T], id: impl Fn(&T) -> u64) -> Option<u64> {
            items
                .iter()
                .map(id)
                .max()
                .map_or(Some(1), |max| max.checked_add(1))
        }

        Self {
            next_collaborator: next(&snapshot.collaborators, |c| c.id),
            next_team: next(&snapshot.teams, |t| t.id),
            next_payment_method: next(&snapshot.payment_methods, |m| m.id),
            next_goal: next(&snapshot.goals, |g| g.id),
            next_sale: next(&snapshot.sales, |s| s.id),
            next_commission: next(&snapshot.commissions, |c| c.id),
        }
    }

    fn take(counter: &mut Option<u64>, entity: &str) -> Result<u64> {
        let id = counter.ok_or_else(|| SalesEngineError::validation(entity, "id space exhausted"))?;
        *counter = id.checked_add(1);
        Ok(id)
    }

    pub fn collaborator(&mut self) -> Result<CollaboratorId> {
        Self::take(&mut self.next_collaborator, "Collaborator")
    }

    pub fn team(&mut self) -> Result<TeamId> {
        Self::take(&mut self.next_team, "Team")
    }

    pub fn payment_method(&mut self) -> Result<PaymentMethodId> {
        Self::take(&mut self.next_payment_method, "PaymentMethod")
    }

    pub fn goal(&mut self) -> Result<GoalId> {
        Self::take(&mut self.next_goal, "Goal")
    }

    pub fn sale(&mut self) -> Result<SaleId> {
        Self::take(&mut self.next_sale, "Sale")
    }

    pub fn commission(&mut self) -> Result<CommissionId> {
        Self::take(&mut self.next_commission, "Commission")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorRole {
    Seller,
    Admin,
    Manager,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Collaborator {
    pub id: CollaboratorId,
    pub name: String,
    pub role: CollaboratorRole,
    #[serde(default)]
    #[schemars(description = "Team the collaborator belongs to, if any")]
    pub team_id: Option<TeamId>,
    pub status: CollaboratorStatus,
}

impl Collaborator {
    pub fn is_active(&self) -> bool {
        self.status == CollaboratorStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    #[schemars(description = "Unique upper-case code referenced by sales (e.g. 'PIX', 'CREDIT')")]
    pub code: String,
    pub name: String,
    #[schemars(description = "Commission paid on sales with this method, in percent (0-100)")]
    pub commission_percentage: f64,
    pub active: bool,
}

impl PaymentMethod {
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(SalesEngineError::validation(
                "PaymentMethod",
                "code must not be empty",
            ));
        }
        if self.code != self.code.to_uppercase() {
            return Err(SalesEngineError::validation(
                "PaymentMethod",
                format!("code '{}' must be upper-case", self.code),
            ));
        }
        if !(0.0..=100.0).contains(&self.commission_percentage) {
            return Err(SalesEngineError::InvalidPercentage(
                self.commission_percentage,
            ));
        }
        Ok(())
    }
}

/// Who a goal belongs to: one collaborator or one whole team, never both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum GoalTarget {
    Individual(CollaboratorId),
    Team(TeamId),
}

impl GoalTarget {
    /// Builds a target from the two-optional-field shape some hosts store.
    /// Exactly one side must be set.
    pub fn from_parts(
        collaborator_id: Option<CollaboratorId>,
        team_id: Option<TeamId>,
    ) -> Result<Self> {
        match (collaborator_id, team_id) {
            (Some(id), None) => Ok(GoalTarget::Individual(id)),
            (None, Some(id)) => Ok(GoalTarget::Team(id)),
            (Some(_), Some(_)) => Err(SalesEngineError::validation(
                "Goal",
                "a goal targets either a collaborator or a team, not both",
            )),
            (None, None) => Err(SalesEngineError::validation(
                "Goal",
                "a goal must target a collaborator or a team",
            )),
        }
    }

    pub fn collaborator_id(&self) -> Option<CollaboratorId> {
        match self {
            GoalTarget::Individual(id) => Some(*id),
            GoalTarget::Team(_) => None,
        }
    }

    pub fn team_id(&self) -> Option<TeamId> {
        match self {
            GoalTarget::Individual(_) => None,
            GoalTarget::Team(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    Monthly,
    Annual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Goal {
    pub id: GoalId,
    pub target: GoalTarget,
    pub period: Period,
    pub target_amount: f64,
    pub kind: GoalKind,
    #[serde(default)]
    #[schemars(
        description = "Roll this goal into the next month at month close. Only meaningful for monthly goals."
    )]
    pub recurring: bool,
    pub status: GoalStatus,
}

impl Goal {
    pub fn validate(&self) -> Result<()> {
        if !self.target_amount.is_finite() || self.target_amount <= 0.0 {
            return Err(SalesEngineError::InvalidAmount(self.target_amount));
        }

        match (self.kind, &self.period) {
            (GoalKind::Monthly, Period::Month(_)) | (GoalKind::Annual, Period::Year(_)) => {}
            (kind, period) => {
                return Err(SalesEngineError::validation(
                    "Goal",
                    format!("{:?} goal cannot use period '{}'", kind, period),
                ));
            }
        }

        if self.recurring && self.kind == GoalKind::Annual {
            return Err(SalesEngineError::validation(
                "Goal",
                "only monthly goals can be recurring",
            ));
        }

        Ok(())
    }

    pub fn is_individual_for(&self, collaborator_id: CollaboratorId) -> bool {
        self.target == GoalTarget::Individual(collaborator_id)
    }

    pub fn is_team_goal_for(&self, team_id: TeamId) -> bool {
        self.target == GoalTarget::Team(team_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Confirmed,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Sale {
    pub id: SaleId,
    pub collaborator_id: CollaboratorId,
    pub client_name: String,
    pub amount: f64,
    #[schemars(description = "Sale date in YYYY-MM-DD format")]
    pub date: NaiveDate,
    #[schemars(description = "Code of the payment method used (matches PaymentMethod.code)")]
    pub payment_method_code: String,
    pub status: SaleStatus,
}

impl Sale {
    /// Checks a sale about to be recorded. Historical sales are never
    /// re-validated against the current catalog.
    pub fn validate(&self, methods: &[PaymentMethod]) -> Result<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(SalesEngineError::InvalidAmount(self.amount));
        }
        if !methods.iter().any(|m| m.code == self.payment_method_code) {
            return Err(SalesEngineError::UnknownPaymentMethod(
                self.payment_method_code.clone(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CommissionBreakdown {
    pub payment_method_code: String,
    #[schemars(description = "Display name of the method, or 'N/A' when it no longer exists")]
    pub payment_method_name: String,
    pub sales_total: f64,
    pub commission_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ApprovalRecord {
    pub approver_id: CollaboratorId,
    pub decided_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Commission {
    pub id: CommissionId,
    pub collaborator_id: CollaboratorId,
    pub period: MonthPeriod,
    #[schemars(description = "Always the sum of the breakdown commission amounts")]
    pub total_commission: f64,
    pub status: CommissionStatus,
    pub calculated_at: DateTime<Utc>,
    #[serde(default)]
    #[schemars(description = "Present once the commission has been approved or rejected")]
    pub approval: Option<ApprovalRecord>,
    pub breakdown: Vec<CommissionBreakdown>,
}

impl Commission {
    pub fn breakdown_sum(&self) -> f64 {
        self.breakdown.iter().map(|b| b.commission_amount).sum()
    }
}

/// Every collection the engine works on, as handed over by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct SalesSnapshot {
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub payment_methods: Vec<PaymentMethod>,
    #[serde(default)]
    pub goals: Vec<Goal>,
    #[serde(default)]
    pub sales: Vec<Sale>,
    #[serde(default)]
    pub commissions: Vec<Commission>,
}

impl SalesSnapshot {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(SalesSnapshot)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn collaborator(&self, id: CollaboratorId) -> Option<&Collaborator> {
        self.collaborators.iter().find(|c| c.id == id)
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    pub fn goal(&self, id: GoalId) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    pub fn commission(&self, id: CommissionId) -> Option<&Commission> {
        self.commissions.iter().find(|c| c.id == id)
    }

    pub fn team_members(&self, team_id: TeamId) -> impl Iterator<Item = &Collaborator> {
        self.collaborators
            .iter()
            .filter(move |c| c.team_id == Some(team_id))
    }

    pub fn goal_target_exists(&self, target: &GoalTarget) -> bool {
        match target {
            GoalTarget::Individual(id) => self.collaborator(*id).is_some(),
            GoalTarget::Team(id) => self.team(*id).is_some(),
        }
    }
}
