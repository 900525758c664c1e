use crate::error::DataWarning;
use crate::schema::{CommissionBreakdown, PaymentMethod, Sale};
use log::{debug, warn};
use std::collections::BTreeMap;

pub const UNKNOWN_METHOD_NAME: &str = "N/A";

pub fn find_method<'a>(code: &str, methods: &'a [PaymentMethod]) -> Option<&'a PaymentMethod> {
    methods.iter().find(|m| m.code == code)
}

/// Commission for a single sale. An unknown method code pays nothing: old
/// sales may point at a method deleted since.
pub fn commission_for(amount: f64, payment_method_code: &str, methods: &[PaymentMethod]) -> f64 {
    let percentage = match find_method(payment_method_code, methods) {
        Some(method) => method.commission_percentage,
        None => {
            debug!(
                "Payment method '{}' not found, commission defaults to 0",
                payment_method_code
            );
            0.0
        }
    };

    amount * percentage / 100.0
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BreakdownResult {
    pub entries: Vec<CommissionBreakdown>,
    pub total_commission: f64,
    pub warnings: Vec<DataWarning>,
}

/// Builds per-payment-method breakdowns. The dashboard preview and the month
/// close both go through here so their totals cannot drift apart.
pub struct CommissionCalculator<'a> {
    methods: &'a [PaymentMethod],
}

impl<'a> CommissionCalculator<'a> {
    pub fn new(methods: &'a [PaymentMethod]) -> Self {
        Self { methods }
    }

    pub fn commission_for(&self, sale: &Sale) -> f64 {
        commission_for(sale.amount, &sale.payment_method_code, self.methods)
    }

    /// Groups `sales` by payment method code. Each entry's commission is
    /// computed on the method's sales total, and the result total is the sum
    /// of the entries.
    pub fn breakdown<'s, I>(&self, sales: I) -> BreakdownResult
    where
        I: IntoIterator<Item = &'s Sale>,
    {
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        let mut warnings = Vec::new();

        for sale in sales {
            if find_method(&sale.payment_method_code, self.methods).is_none() {
                warn!(
                    "Sale #{} references unknown payment method '{}'",
                    sale.id, sale.payment_method_code
                );
                warnings.push(DataWarning::UnknownPaymentMethod {
                    sale_id: sale.id,
                    code: sale.payment_method_code.clone(),
                });
            }
            *totals.entry(sale.payment_method_code.as_str()).or_default() += sale.amount;
        }

        let entries: Vec<CommissionBreakdown> = totals
            .into_iter()
            .filter(|(_, sales_total)| *sales_total != 0.0)
            .map(|(code, sales_total)| {
                let name = find_method(code, self.methods)
                    .map(|m| m.name.clone())
                    .unwrap_or_else(|| UNKNOWN_METHOD_NAME.to_string());
                CommissionBreakdown {
                    payment_method_code: code.to_string(),
                    payment_method_name: name,
                    sales_total,
                    commission_amount: commission_for(sales_total, code, self.methods),
                }
            })
            .collect();

        let total_commission = entries.iter().map(|e| e.commission_amount).sum();

        BreakdownResult {
            entries,
            total_commission,
            warnings,
        }
    }
}
