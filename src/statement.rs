use crate::period::MonthPeriod;
use crate::schema::{CollaboratorId, CommissionId, CommissionStatus, SalesSnapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatementLine {
    pub commission_id: CommissionId,
    pub collaborator_id: CollaboratorId,
    /// `None` when the collaborator is missing from the roster.
    pub collaborator_name: Option<String>,
    pub sales_total: f64,
    pub total_commission: f64,
    pub status: CommissionStatus,
}

/// Every commission of one closed month, grouped by approval status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommissionStatement {
    pub period: MonthPeriod,
    pub pending: Vec<StatementLine>,
    pub approved: Vec<StatementLine>,
    pub rejected: Vec<StatementLine>,
    pub paid: Vec<StatementLine>,
}

impl CommissionStatement {
    pub fn from_snapshot(snapshot: &SalesSnapshot, period: MonthPeriod) -> Self {
        let mut statement = Self {
            period,
            pending: Vec::new(),
            approved: Vec::new(),
            rejected: Vec::new(),
            paid: Vec::new(),
        };

        for commission in snapshot.commissions.iter().filter(|c| c.period == period) {
            let line = StatementLine {
                commission_id: commission.id,
                collaborator_id: commission.collaborator_id,
                collaborator_name: snapshot
                    .collaborator(commission.collaborator_id)
                    .map(|c| c.name.clone()),
                sales_total: commission.breakdown.iter().map(|b| b.sales_total).sum(),
                total_commission: commission.total_commission,
                status: commission.status,
            };

            match commission.status {
                CommissionStatus::Pending => statement.pending.push(line),
                CommissionStatus::Approved => statement.approved.push(line),
                CommissionStatus::Rejected => statement.rejected.push(line),
                CommissionStatus::Paid => statement.paid.push(line),
            }
        }

        statement
    }

    pub fn lines(&self) -> impl Iterator<Item = &StatementLine> {
        self.pending
            .iter()
            .chain(&self.approved)
            .chain(&self.rejected)
            .chain(&self.paid)
    }

    pub fn line_count(&self) -> usize {
        self.lines().count()
    }

    /// Everything still owed or already paid. Rejected lines are left out.
    pub fn payable_total(&self) -> f64 {
        self.pending
            .iter()
            .chain(&self.approved)
            .chain(&self.paid)
            .map(|l| l.total_commission)
            .sum()
    }

    pub fn paid_total(&self) -> f64 {
        self.paid.iter().map(|l| l.total_commission).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("Period,Status,Commission Id,Collaborator Id,Collaborator,Sales Total,Commission\n");

        for line in self.lines() {
            output.push_str(&format!(
                "{},{},{},{},{},{:.2},{:.2}\n",
                self.period,
                status_label(line.status),
                line.commission_id,
                line.collaborator_id,
                csv_field(line.collaborator_name.as_deref().unwrap_or("N/A")),
                line.sales_total,
                line.total_commission
            ));
        }

        output
    }
}

fn status_label(status: CommissionStatus) -> &'static str {
    match status {
        CommissionStatus::Pending => "pending",
        CommissionStatus::Approved => "approved",
        CommissionStatus::Rejected => "rejected",
        CommissionStatus::Paid => "paid",
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;
    use chrono::{TimeZone, Utc};

    fn commission(id: CommissionId, collaborator_id: CollaboratorId, status: CommissionStatus) -> Commission {
        Commission {
            id,
            collaborator_id,
            period: "2025-08".parse().unwrap(),
            total_commission: 60.0,
            status,
            calculated_at: Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap(),
            approval: None,
            breakdown: vec![CommissionBreakdown {
                payment_method_code: "PIX".to_string(),
                payment_method_name: "Pix".to_string(),
                sales_total: 1000.0,
                commission_amount: 60.0,
            }],
        }
    }

    fn snapshot() -> SalesSnapshot {
        SalesSnapshot {
            collaborators: vec![Collaborator {
                id: 5,
                name: "Souza, Marina".to_string(),
                role: CollaboratorRole::Seller,
                team_id: None,
                status: CollaboratorStatus::Active,
            }],
            commissions: vec![
                commission(1, 5, CommissionStatus::Paid),
                commission(2, 6, CommissionStatus::Rejected),
                commission(3, 7, CommissionStatus::Pending),
                Commission {
                    period: "2025-07".parse().unwrap(),
                    ..commission(4, 5, CommissionStatus::Paid)
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_groups_by_status_for_one_period() {
        let statement = CommissionStatement::from_snapshot(&snapshot(), "2025-08".parse().unwrap());

        assert_eq!(statement.line_count(), 3);
        assert_eq!(statement.paid.len(), 1);
        assert_eq!(statement.rejected.len(), 1);
        assert_eq!(statement.pending.len(), 1);
        assert!(statement.approved.is_empty());
        assert_eq!(statement.paid[0].collaborator_name.as_deref(), Some("Souza, Marina"));
        assert_eq!(statement.pending[0].collaborator_name, None);
        assert_eq!(statement.payable_total(), 120.0);
        assert_eq!(statement.paid_total(), 60.0);
    }

    #[test]
    fn test_to_csv() {
        let statement = CommissionStatement::from_snapshot(&snapshot(), "2025-08".parse().unwrap());
        let csv = statement.to_csv();

        assert!(csv.starts_with("Period,Status,"));
        assert!(csv.contains("2025-08,pending,3,7,N/A,1000.00,60.00"));
        assert!(csv.contains("2025-08,paid,1,5,\"Souza, Marina\",1000.00,60.00"));
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn test_to_json() {
        let statement = CommissionStatement::from_snapshot(&snapshot(), "2025-07".parse().unwrap());
        let json = statement.to_json().unwrap();
        assert!(json.contains("\"period\": \"2025-07\""));
        assert!(json.contains("\"status\": \"paid\""));
    }
}
