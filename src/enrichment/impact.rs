use crate::core::currency::CurrencyCode;
use crate::enrichment::fx::EnrichedTable;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Financial impact of the reconciliation in base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxImpactReport {
    pub base_currency: CurrencyCode,
    /// Sum of converted representative amounts.
    pub total_volume: Decimal,
    /// Sum of hidden costs over paired outcomes.
    pub total_hidden_cost: Decimal,
    /// Rows whose representative amount could not be converted.
    pub unconverted_rows: usize,
    pub currency_breakdown: BTreeMap<CurrencyCode, CurrencyImpact>,
}

/// Impact figures for one transaction currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyImpact {
    pub currency: CurrencyCode,
    pub outcomes: usize,
    pub volume: Decimal,
    pub hidden_cost: Decimal,
    pub net_open_position: Decimal,
}

impl FxImpactReport {
    pub fn from_table(table: &EnrichedTable) -> Self {
        let mut total_volume = Decimal::ZERO;
        let mut total_hidden_cost = Decimal::ZERO;
        let mut unconverted_rows = 0;
        let mut breakdown: BTreeMap<CurrencyCode, CurrencyImpact> = BTreeMap::new();

        for row in table.rows() {
            let currency = row.currency().clone();
            let entry = breakdown
                .entry(currency.clone())
                .or_insert_with(|| CurrencyImpact {
                    net_open_position: table.positions().position(&currency),
                    currency,
                    outcomes: 0,
                    volume: Decimal::ZERO,
                    hidden_cost: Decimal::ZERO,
                });
            entry.outcomes += 1;

            // Totals saturate at the bounds of Decimal.
            match row.converted_amount_base() {
                Some(amount) => {
                    total_volume = total_volume.saturating_add(amount);
                    entry.volume = entry.volume.saturating_add(amount);
                }
                None => unconverted_rows += 1,
            }
            if let Some(cost) = row.hidden_cost() {
                total_hidden_cost = total_hidden_cost.saturating_add(cost);
                entry.hidden_cost = entry.hidden_cost.saturating_add(cost);
            }
        }

        Self {
            base_currency: table.base_currency().clone(),
            total_volume,
            total_hidden_cost,
            unconverted_rows,
            currency_breakdown: breakdown,
        }
    }
}

impl std::fmt::Display for FxImpactReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== FX Impact ({}) ===", self.base_currency)?;
        writeln!(f, "Volume:         {}", self.total_volume.round_dp(2))?;
        writeln!(f, "Hidden cost:    {}", self.total_hidden_cost.round_dp(2))?;
        writeln!(f, "Unconverted:    {}", self.unconverted_rows)?;

        for (currency, impact) in &self.currency_breakdown {
            writeln!(f, "\n--- {} ---", currency)?;
            writeln!(f, "  Outcomes:    {}", impact.outcomes)?;
            writeln!(f, "  Volume:      {}", impact.volume.round_dp(2))?;
            writeln!(f, "  Hidden cost: {}", impact.hidden_cost.round_dp(2))?;
            writeln!(f, "  Open pos.:   {}", impact.net_open_position.round_dp(2))?;
        }
        Ok(())
    }
}
