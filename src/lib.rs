//! # Sales Commission Engine
//!
//! Core rules of a sales-team performance tracker: goals, commissions by
//! payment method, reporting per period and the month-end close.
//!
//! ## Core Concepts
//!
//! - **Period**: `YYYY-MM` for monthly goals and commissions, `YYYY` for annual goals
//! - **Active Period**: the month (or day range) a dashboard is computed for, resolved from a view mode and a simulated date
//! - **Commission**: per collaborator and month, the sum of `sales_total * percentage / 100` over each payment method used
//! - **Month Close**: turns last month's sales into pending commissions and rolls recurring goals forward
//! - **Approval**: pending commissions are approved then paid, or rejected with a reason
//!
//! The engine never does I/O. Hosts hand in a [`SalesSnapshot`] (or drive a
//! [`SalesStore`]) and persist whatever comes back.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sales_commission_engine::*;
//! use chrono::NaiveDate;
//!
//! let mut store = SalesStore::new(EngineConfig::default(), NaiveDate::from_ymd_opt(2025, 8, 20).unwrap());
//! let marina = store.add_collaborator(NewCollaborator {
//!     name: "Marina".to_string(),
//!     role: CollaboratorRole::Seller,
//!     team_id: None,
//! })?;
//! store.add_payment_method("PIX", "Pix", 6.0)?;
//! store.record_sale(NewSale {
//!     collaborator_id: marina,
//!     client_name: "Padaria Central".to_string(),
//!     amount: 1000.0,
//!     date: NaiveDate::from_ymd_opt(2025, 8, 14).unwrap(),
//!     payment_method_code: "PIX".to_string(),
//!     status: SaleStatus::Confirmed,
//! })?;
//!
//! let dashboard = store.dashboard();
//! assert_eq!(dashboard.kpis.total_commission, 60.0);
//!
//! store.set_simulated_date(NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
//! let outcome = store.close_month(ClosingOverrides::default())?;
//! assert_eq!(outcome.new_commissions[0].total_commission, 60.0);
//! ```

pub mod approval;
pub mod closing;
pub mod commission;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod integrity;
pub mod notifications;
pub mod overrides;
pub mod period;
pub mod schema;
pub mod statement;
pub mod store;
pub mod utils;

pub use closing::{
    check_closable, closable_period, close_month, closing_period_for, compute_month_close,
    ClosingRequest, MonthCloseOutcome,
};
pub use commission::{commission_for, BreakdownResult, CommissionCalculator, UNKNOWN_METHOD_NAME};
pub use config::EngineConfig;
pub use engine::*;
pub use error::{DataWarning, Result, SalesEngineError};
pub use ingestion::*;
pub use integrity::{verify_commission, IntegrityChecker, IntegrityViolation, VerificationResult};
pub use notifications::{
    dispatch_notifications, DomainEvent, GoalThresholdCrossed, NotificationSink,
    ThresholdEvaluator,
};
pub use overrides::*;
pub use period::*;
pub use schema::*;
pub use statement::{CommissionStatement, StatementLine};
pub use store::{NewCollaborator, NewGoal, NewSale, SalesStore};
pub use utils::*;

use log::{debug, info};

/// Runs the checked month close and then verifies that every new commission
/// total matches its breakdown within `tolerance`.
pub fn close_month_with_verification(
    snapshot: &SalesSnapshot,
    request: &ClosingRequest,
    tolerance: f64,
) -> Result<MonthCloseOutcome> {
    let outcome = close_month(snapshot, request)?;

    for commission in &outcome.new_commissions {
        verify_commission(commission, tolerance)?;
    }

    if !outcome.warnings.is_empty() {
        for warning in &outcome.warnings {
            debug!("Month close warning: {}", warning);
        }
    }
    info!(
        "Verified {} commissions for {}",
        outcome.new_commissions.len(),
        outcome.closing_period
    );

    Ok(outcome)
}
