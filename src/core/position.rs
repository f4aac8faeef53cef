use crate::core::currency::CurrencyCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Net open position per currency, expressed in the base currency.
///
/// A positive balance is a net long exposure to the currency, a negative
/// balance a net short. Built during FX enrichment and read-only after.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetOpenPosition {
    positions: BTreeMap<CurrencyCode, Decimal>,
}

impl NetOpenPosition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a base-converted flow to the running sum of its currency.
    /// The sum saturates at the bounds of `Decimal`.
    pub(crate) fn apply_flow(&mut self, currency: &CurrencyCode, converted: Decimal) {
        let position = self
            .positions
            .entry(currency.clone())
            .or_insert(Decimal::ZERO);
        match position.checked_add(converted) {
            Some(sum) => *position = sum,
            None => {
                log::warn!("{} open position saturated at the Decimal range", currency);
                *position = position.saturating_add(converted);
            }
        }
    }

    /// Net exposure to `currency`, zero when the currency never appeared.
    pub fn position(&self, currency: &CurrencyCode) -> Decimal {
        self.positions
            .get(currency)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// All positions in currency order.
    pub fn iter(&self) -> impl Iterator<Item = (&CurrencyCode, &Decimal)> {
        self.positions.iter()
    }

    pub fn currencies(&self) -> Vec<CurrencyCode> {
        self.positions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sum of absolute exposures across currencies.
    pub fn gross_exposure(&self) -> Decimal {
        self.positions
            .values()
            .fold(Decimal::ZERO, |acc, v| acc.saturating_add(v.abs()))
    }
}
