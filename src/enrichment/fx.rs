use crate::core::currency::{
    ConversionError, ConversionOverflowError, CurrencyCode, FxRateTable, MissingRateError,
};
use crate::core::position::NetOpenPosition;
use crate::core::record::TransactionRecord;
use crate::reconciliation::outcome::{Classification, ClassifiedOutcome};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A classified outcome with its amounts converted into the base currency.
///
/// A side whose rate could not be found, or whose converted amount would
/// overflow, keeps `None`; the row itself is never dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRow {
    pub outcome: ClassifiedOutcome,
    pub ledger_converted: Option<Decimal>,
    pub bank_converted: Option<Decimal>,
}

impl EnrichedRow {
    pub fn classification(&self) -> Classification {
        self.outcome.classification()
    }

    pub fn currency(&self) -> &CurrencyCode {
        self.outcome.currency()
    }

    /// Base-currency amount of the representative side (ledger when present).
    pub fn converted_amount_base(&self) -> Option<Decimal> {
        if self.outcome.ledger().is_some() {
            self.ledger_converted
        } else {
            self.bank_converted
        }
    }

    /// Signed spread between the converted ledger and bank amounts.
    ///
    /// Only paired outcomes carry a hidden cost, and only when both sides
    /// converted and their difference is representable.
    pub fn hidden_cost(&self) -> Option<Decimal> {
        if !self.classification().is_paired() {
            return None;
        }
        match (self.ledger_converted, self.bank_converted) {
            (Some(l), Some(b)) => l.checked_sub(b),
            _ => None,
        }
    }
}

/// Output of FX enrichment: one row per outcome plus the positions built
/// from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTable {
    base_currency: CurrencyCode,
    rows: Vec<EnrichedRow>,
    positions: NetOpenPosition,
    missing_rates: Vec<MissingRateError>,
    overflowed: Vec<ConversionOverflowError>,
}

impl EnrichedTable {
    pub fn base_currency(&self) -> &CurrencyCode {
        &self.base_currency
    }

    pub fn rows(&self) -> &[EnrichedRow] {
        &self.rows
    }

    pub fn positions(&self) -> &NetOpenPosition {
        &self.positions
    }

    /// One entry per record side that could not be converted.
    pub fn missing_rates(&self) -> &[MissingRateError] {
        &self.missing_rates
    }

    /// Record sides whose converted amount did not fit in a `Decimal`.
    pub fn overflowed_conversions(&self) -> &[ConversionOverflowError] {
        &self.overflowed
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Convert every outcome into the base currency of `rates`.
///
/// The Net Open Position is the per-currency running sum of ledger-side
/// converted amounts over every outcome except `MISSING_LEDGER`.
pub fn enrich(
    outcomes: impl IntoIterator<Item = ClassifiedOutcome>,
    rates: &FxRateTable,
) -> EnrichedTable {
    let mut rows = Vec::new();
    let mut positions = NetOpenPosition::new();
    let mut missing_rates = Vec::new();
    let mut overflowed = Vec::new();

    let mut convert = |record: Option<&TransactionRecord>| -> Option<Decimal> {
        let record = record?;
        match rates.convert_to_base(record.amount(), record.currency(), record.date()) {
            Ok(converted) => Some(converted),
            Err(err) => {
                log::warn!("{} (record #{} from {})", err, record.index(), record.source());
                match err {
                    ConversionError::MissingRate(e) => missing_rates.push(e),
                    ConversionError::Overflow(e) => overflowed.push(e),
                }
                None
            }
        }
    };

    for outcome in outcomes {
        let ledger_converted = convert(outcome.ledger());
        let bank_converted = convert(outcome.bank());

        if outcome.classification() != Classification::MissingLedger {
            if let (Some(ledger), Some(converted)) = (outcome.ledger(), ledger_converted) {
                positions.apply_flow(ledger.currency(), converted);
            }
        }

        rows.push(EnrichedRow {
            outcome,
            ledger_converted,
            bank_converted,
        });
    }

    log::info!(
        "enriched {} outcomes into {} ({} unconverted sides, {} open currencies)",
        rows.len(),
        rates.base_currency,
        missing_rates.len() + overflowed.len(),
        positions.len()
    );

    EnrichedTable {
        base_currency: rates.base_currency.clone(),
        rows,
        positions,
        missing_rates,
        overflowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::CurrencyPair;
    use crate::core::record::SourceSystem;
    use crate::reconciliation::matcher::{MatchTolerance, Reconciler};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn rec(source: SourceSystem, index: usize, reference: &str, ccy: &str, amount: Decimal) -> TransactionRecord {
        TransactionRecord::new(source, index, day(5), CurrencyCode::new(ccy), amount).with_reference(reference)
    }

    fn rates() -> FxRateTable {
        let mut table = FxRateTable::new(CurrencyCode::new("EUR"));
        table
            .set_rate(
                CurrencyPair::new(CurrencyCode::new("EUR"), CurrencyCode::new("USD")),
                day(1),
                dec!(1.25),
            )
            .unwrap();
        table
    }

    fn outcomes(ledger: Vec<TransactionRecord>, bank: Vec<TransactionRecord>) -> Vec<ClassifiedOutcome> {
        Reconciler::new(MatchTolerance::new(dec!(1.00), 0)).reconcile_records(ledger, bank)
    }

    #[test]
    fn test_hidden_cost_same_currency() {
        let table = enrich(
            outcomes(
                vec![rec(SourceSystem::Ledger, 0, "A1", "EUR", dec!(1000.00))],
                vec![rec(SourceSystem::Bank, 0, "A1", "EUR", dec!(999.50))],
            ),
            &rates(),
        );
        let row = &table.rows()[0];
        assert_eq!(row.classification(), Classification::Match);
        assert_eq!(row.hidden_cost(), Some(dec!(0.50)));
        assert_eq!(row.converted_amount_base(), Some(dec!(1000.00)));
    }

    #[test]
    fn test_foreign_amounts_converted() {
        let table = enrich(
            outcomes(
                vec![rec(SourceSystem::Ledger, 0, "U1", "USD", dec!(125))],
                vec![rec(SourceSystem::Bank, 0, "U1", "USD", dec!(100))],
            ),
            &rates(),
        );
        let row = &table.rows()[0];
        assert_eq!(row.classification(), Classification::Mismatch);
        assert_eq!(row.ledger_converted, Some(dec!(100)));
        assert_eq!(row.bank_converted, Some(dec!(80)));
        assert_eq!(row.hidden_cost(), Some(dec!(20)));
    }

    #[test]
    fn test_missing_rate_keeps_row() {
        let table = enrich(
            outcomes(vec![rec(SourceSystem::Ledger, 0, "C1", "CHF", dec!(50))], vec![]),
            &rates(),
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].converted_amount_base(), None);
        assert_eq!(table.missing_rates().len(), 1);
        assert_eq!(table.missing_rates()[0].currency.as_str(), "CHF");
        assert!(table.positions().is_empty());
    }

    #[test]
    fn test_net_open_position_skips_missing_ledger() {
        let table = enrich(
            outcomes(
                vec![
                    rec(SourceSystem::Ledger, 0, "P1", "USD", dec!(250)),
                    rec(SourceSystem::Ledger, 1, "P2", "USD", dec!(-125)),
                ],
                vec![
                    rec(SourceSystem::Bank, 0, "P1", "USD", dec!(250)),
                    rec(SourceSystem::Bank, 1, "ONLY-BANK", "USD", dec!(1000)),
                ],
            ),
            &rates(),
        );
        // P1 matched (200 EUR), P2 missing in bank (-100 EUR); bank-only ignored.
        assert_eq!(table.positions().position(&CurrencyCode::new("USD")), dec!(100));
        assert_eq!(table.rows()[2].hidden_cost(), None);
        assert_eq!(table.rows()[2].converted_amount_base(), Some(dec!(800)));
    }

    #[test]
    fn test_overflowing_conversion_leaves_side_unconverted() {
        let huge = Decimal::MAX - dec!(1);
        let table = enrich(
            outcomes(
                vec![rec(SourceSystem::Ledger, 0, "H1", "EUR", huge)],
                vec![rec(SourceSystem::Bank, 0, "H1", "EUR", -huge)],
            ),
            &rates(),
        );
        let row = &table.rows()[0];
        assert_eq!(row.classification(), Classification::Mismatch);
        assert_eq!(row.ledger_converted, Some(huge));
        assert_eq!(row.bank_converted, Some(-huge));
        // The spread itself is not representable.
        assert_eq!(row.hidden_cost(), None);

        let usd = enrich(
            outcomes(vec![rec(SourceSystem::Ledger, 0, "U9", "USD", Decimal::MIN)], vec![]),
            &{
                let mut table = FxRateTable::new(CurrencyCode::new("EUR"));
                table
                    .set_rate(
                        CurrencyPair::new(CurrencyCode::new("USD"), CurrencyCode::new("EUR")),
                        day(1),
                        dec!(2),
                    )
                    .unwrap();
                table
            },
        );
        assert_eq!(usd.rows()[0].converted_amount_base(), None);
        assert_eq!(usd.overflowed_conversions().len(), 1);
        assert!(usd.missing_rates().is_empty());
        assert!(usd.positions().is_empty());
    }
}
