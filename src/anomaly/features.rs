use crate::core::currency::CurrencyCode;
use crate::enrichment::fx::EnrichedTable;
use crate::reconciliation::outcome::Classification;
use chrono::Datelike;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Numeric features of one enriched record, in [`FEATURE_NAMES`] order.
pub type FeatureVector = Vec<f64>;

pub const FEATURE_NAMES: [&str; 6] = [
    "amount_base",
    "currency",
    "hidden_cost_abs",
    "classification",
    "day_of_year",
    "discrepancy_ratio",
];

/// Added to the denominator of the discrepancy ratio so zero amounts stay finite.
const RATIO_FLOOR: f64 = 0.01;

/// Feature matrix built from an enriched table, one row per outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    /// Currency codes in encoding order: code `i` is encoded as `i`.
    pub currencies: Vec<CurrencyCode>,
    pub rows: Vec<FeatureVector>,
}

impl FeatureTable {
    pub fn from_enriched(table: &EnrichedTable) -> Self {
        let mut currencies: Vec<CurrencyCode> =
            table.rows().iter().map(|row| row.currency().clone()).collect();
        currencies.sort();
        currencies.dedup();

        let rows = table
            .rows()
            .iter()
            .map(|row| {
                let currency = currencies
                    .binary_search(row.currency())
                    .map(|i| i as f64)
                    .unwrap_or(0.0);
                let primary = row.outcome.primary();
                let raw_amount = to_f64(primary.amount());
                let ratio = to_f64(row.outcome.amount_diff()) / (raw_amount.abs() + RATIO_FLOOR);

                vec![
                    row.converted_amount_base().map(to_f64).unwrap_or(0.0),
                    currency,
                    row.hidden_cost().map(|c| to_f64(c).abs()).unwrap_or(0.0),
                    encode_classification(row.classification()),
                    f64::from(primary.date().ordinal()),
                    ratio,
                ]
            })
            .collect();

        Self { currencies, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn encode_classification(classification: Classification) -> f64 {
    match classification {
        Classification::Match => 0.0,
        Classification::Mismatch => 1.0,
        Classification::MissingBank => 2.0,
        Classification::MissingLedger => 3.0,
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
