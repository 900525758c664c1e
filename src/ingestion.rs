use crate::error::{Result, SalesEngineError};
use crate::schema::{Collaborator, CollaboratorId, IdSequence, PaymentMethod, Sale, SaleStatus};
use crate::utils::parse_sale_date;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// One already-parsed import row (spreadsheet, CSV, form post...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleRow {
    pub collaborator_id: CollaboratorId,
    pub client_name: String,
    pub amount: f64,
    pub date: String,
    pub payment_method_code: String,
    #[serde(default)]
    pub status: Option<SaleStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowRejection {
    /// Zero-based position in the input.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestionReport {
    pub sales: Vec<Sale>,
    pub rejected: Vec<RowRejection>,
}

impl IngestionReport {
    pub fn accepted_count(&self) -> usize {
        self.sales.len()
    }

    pub fn has_rejections(&self) -> bool {
        !self.rejected.is_empty()
    }
}

fn convert_row(
    row: &SaleRow,
    collaborators: &[Collaborator],
    methods: &[PaymentMethod],
) -> Result<Sale> {
    if !collaborators.iter().any(|c| c.id == row.collaborator_id) {
        return Err(SalesEngineError::NotFound {
            entity: "Collaborator",
            id: row.collaborator_id,
        });
    }
    if row.client_name.trim().is_empty() {
        return Err(SalesEngineError::validation(
            "Sale",
            "client name must not be empty",
        ));
    }

    let date = parse_sale_date(&row.date)
        .map(|dt| dt.date())
        .ok_or_else(|| SalesEngineError::validation("Sale", format!("unreadable date '{}'", row.date)))?;

    let sale = Sale {
        id: 0,
        collaborator_id: row.collaborator_id,
        client_name: row.client_name.trim().to_string(),
        amount: row.amount,
        date,
        payment_method_code: row.payment_method_code.trim().to_uppercase(),
        status: row.status.unwrap_or(SaleStatus::Confirmed),
    };
    sale.validate(methods)?;

    Ok(sale)
}

/// Converts import rows into sales. Each row is judged on its own; a bad row
/// is reported in `rejected` and never stops the rest. Ids are only consumed
/// by accepted rows.
pub fn ingest_sale_rows(
    rows: &[SaleRow],
    collaborators: &[Collaborator],
    methods: &[PaymentMethod],
    ids: &mut IdSequence,
) -> IngestionReport {
    let mut report = IngestionReport::default();

    for (index, row) in rows.iter().enumerate() {
        let converted = convert_row(row, collaborators, methods)
            .and_then(|sale| Ok(Sale { id: ids.sale()?, ..sale }));
        match converted {
            Ok(sale) => report.sales.push(sale),
            Err(e) => {
                debug!("Rejected import row {}: {}", index, e);
                report.rejected.push(RowRejection {
                    row: index,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Ingested {} sales ({} rows rejected)",
        report.sales.len(),
        report.rejected.len()
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CollaboratorRole, CollaboratorStatus};
    use chrono::NaiveDate;

    fn roster() -> Vec<Collaborator> {
        vec![Collaborator {
            id: 5,
            name: "Marina".to_string(),
            role: CollaboratorRole::Seller,
            team_id: None,
            status: CollaboratorStatus::Active,
        }]
    }

    fn methods() -> Vec<PaymentMethod> {
        vec![PaymentMethod {
            id: 1,
            code: "PIX".to_string(),
            name: "Pix".to_string(),
            commission_percentage: 6.0,
            active: true,
        }]
    }

    fn row(amount: f64, date: &str, code: &str) -> SaleRow {
        SaleRow {
            collaborator_id: 5,
            client_name: "Casa Verde".to_string(),
            amount,
            date: date.to_string(),
            payment_method_code: code.to_string(),
            status: None,
        }
    }

    #[test]
    fn test_accepts_valid_rows_and_normalizes() {
        let mut ids = IdSequence::default();
        let report = ingest_sale_rows(
            &[row(100.0, "2025-08-03", " pix "), row(50.0, "2025-08-04T15:20:00", "PIX")],
            &roster(),
            &methods(),
            &mut ids,
        );

        assert_eq!(report.accepted_count(), 2);
        assert!(!report.has_rejections());
        assert_eq!(report.sales[0].id, 1);
        assert_eq!(report.sales[0].payment_method_code, "PIX");
        assert_eq!(report.sales[0].status, SaleStatus::Confirmed);
        assert_eq!(
            report.sales[1].date,
            NaiveDate::from_ymd_opt(2025, 8, 4).unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_rows_individually() {
        let mut ids = IdSequence::default();
        let mut blank_client = row(10.0, "2025-08-05", "PIX");
        blank_client.client_name = "  ".to_string();
        let mut stranger = row(10.0, "2025-08-05", "PIX");
        stranger.collaborator_id = 77;

        let report = ingest_sale_rows(
            &[
                row(-5.0, "2025-08-01", "PIX"),
                row(10.0, "03/08/2025", "PIX"),
                row(10.0, "2025-08-02", "BOLETO"),
                blank_client,
                stranger,
                row(10.0, "2025-08", "PIX"),
                row(f64::INFINITY, "2025-08-06", "PIX"),
                row(75.0, "2025-08-06", "PIX"),
            ],
            &roster(),
            &methods(),
            &mut ids,
        );

        assert_eq!(report.accepted_count(), 1);
        assert_eq!(report.sales[0].id, 1);
        let rejected_rows: Vec<usize> = report.rejected.iter().map(|r| r.row).collect();
        assert_eq!(rejected_rows, vec![0, 1, 2, 3, 4, 5, 6]);
        assert!(report.rejected[1].reason.contains("03/08/2025"));
        assert!(report.rejected[2].reason.contains("BOLETO"));
        assert!(report.rejected[4].reason.contains("#77"));
        assert!(report.rejected[5].reason.contains("'2025-08'"));
    }

    #[test]
    fn test_exhausted_sale_ids_reject_rows() {
        let snapshot = crate::schema::SalesSnapshot {
            sales: vec![Sale {
                id: u64::MAX,
                collaborator_id: 5,
                client_name: "Mercado Sol".to_string(),
                amount: 20.0,
                date: NaiveDate::from_ymd_opt(2025, 7, 30).unwrap(),
                payment_method_code: "PIX".to_string(),
                status: SaleStatus::Confirmed,
            }],
            ..Default::default()
        };
        let mut ids = IdSequence::after(&snapshot);

        let report = ingest_sale_rows(
            &[row(100.0, "2025-08-03", "PIX"), row(50.0, "2025-08-04", "PIX")],
            &roster(),
            &methods(),
            &mut ids,
        );

        assert_eq!(report.accepted_count(), 0);
        assert_eq!(report.rejected.len(), 2);
        assert!(report.rejected[0].reason.contains("id space exhausted"));
    }

    #[test]
    fn test_row_deserializes_without_status() {
        let row: SaleRow = serde_json::from_str(
            r#"{"collaborator_id": 2, "client_name": "Bar do Zé", "amount": 42.5,
                "date": "2025-08-09", "payment_method_code": "PIX"}"#,
        )
        .unwrap();
        assert_eq!(row.status, None);
    }
}
