use crate::core::currency::CurrencyCode;
use crate::core::record::{RecordValidationError, TransactionRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Match status of a classified outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// Paired; amount and date within tolerance.
    Match,
    /// Paired; amount, date or currency outside tolerance.
    Mismatch,
    /// Present in the ledger only.
    MissingBank,
    /// Present in the bank feed only.
    MissingLedger,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Classification::Match,
        Classification::Mismatch,
        Classification::MissingBank,
        Classification::MissingLedger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Match => "MATCH",
            Classification::Mismatch => "MISMATCH",
            Classification::MissingBank => "MISSING_BANK",
            Classification::MissingLedger => "MISSING_LEDGER",
        }
    }

    /// Whether the outcome pairs a ledger record with a bank record.
    pub fn is_paired(&self) -> bool {
        matches!(self, Classification::Match | Classification::Mismatch)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What pushed a paired outcome out of tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchReason {
    Amount,
    Date,
    AmountAndDate,
    /// The two records are denominated in different currencies.
    Currency,
}

/// One reconciliation result: a pair, or a single unpaired record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedOutcome {
    classification: Classification,
    ledger: Option<TransactionRecord>,
    bank: Option<TransactionRecord>,
    mismatch: Option<MismatchReason>,
}

impl ClassifiedOutcome {
    pub(crate) fn paired(
        ledger: TransactionRecord,
        bank: TransactionRecord,
        mismatch: Option<MismatchReason>,
    ) -> Self {
        let classification = if mismatch.is_some() {
            Classification::Mismatch
        } else {
            Classification::Match
        };
        Self {
            classification,
            ledger: Some(ledger),
            bank: Some(bank),
            mismatch,
        }
    }

    pub(crate) fn missing_bank(ledger: TransactionRecord) -> Self {
        Self {
            classification: Classification::MissingBank,
            ledger: Some(ledger),
            bank: None,
            mismatch: None,
        }
    }

    pub(crate) fn missing_ledger(bank: TransactionRecord) -> Self {
        Self {
            classification: Classification::MissingLedger,
            ledger: None,
            bank: Some(bank),
            mismatch: None,
        }
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn ledger(&self) -> Option<&TransactionRecord> {
        self.ledger.as_ref()
    }

    pub fn bank(&self) -> Option<&TransactionRecord> {
        self.bank.as_ref()
    }

    pub fn mismatch_reason(&self) -> Option<MismatchReason> {
        self.mismatch
    }

    /// Constituent records, ledger side first.
    pub fn records(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.ledger.iter().chain(self.bank.iter())
    }

    /// The record that represents the outcome: the ledger side when present.
    pub fn primary(&self) -> &TransactionRecord {
        match (&self.ledger, &self.bank) {
            (Some(ledger), _) => ledger,
            (None, Some(bank)) => bank,
            // Constructors never build an empty outcome.
            (None, None) => unreachable!("classified outcome without records"),
        }
    }

    pub fn currency(&self) -> &CurrencyCode {
        self.primary().currency()
    }

    /// Ledger amount minus bank amount, a missing side counting as zero.
    /// Saturates at the bounds of `Decimal`.
    pub fn amount_diff(&self) -> Decimal {
        let ledger = self.ledger.as_ref().map(|r| r.amount()).unwrap_or(Decimal::ZERO);
        let bank = self.bank.as_ref().map(|r| r.amount()).unwrap_or(Decimal::ZERO);
        ledger.saturating_sub(bank)
    }
}

/// Output of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    outcomes: Vec<ClassifiedOutcome>,
    rejected: Vec<RecordValidationError>,
}

impl ReconciliationResult {
    pub(crate) fn new(
        outcomes: Vec<ClassifiedOutcome>,
        rejected: Vec<RecordValidationError>,
    ) -> Self {
        Self { outcomes, rejected }
    }

    /// Wrap outcomes of already validated records.
    pub fn from_outcomes(outcomes: Vec<ClassifiedOutcome>) -> Self {
        Self::new(outcomes, Vec::new())
    }

    pub fn outcomes(&self) -> &[ClassifiedOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<ClassifiedOutcome> {
        self.outcomes
    }

    /// Records excluded by validation, in input order (ledger first).
    pub fn rejected(&self) -> &[RecordValidationError] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of input records referenced by the outcomes.
    pub fn record_coverage(&self) -> usize {
        self.outcomes.iter().map(|o| o.records().count()).sum()
    }

    /// Check that every admitted input record appears in exactly one outcome.
    ///
    /// `ledger_len` and `bank_len` are the raw input lengths; rejected
    /// records are accounted for separately.
    pub fn verify_completeness(&self, ledger_len: usize, bank_len: usize) -> bool {
        use crate::core::record::SourceSystem;
        let mut seen = [vec![false; ledger_len], vec![false; bank_len]];
        let mut mark = |side: usize, index: usize| -> bool {
            match seen[side].get_mut(index) {
                Some(slot) if !*slot => {
                    *slot = true;
                    true
                }
                _ => false,
            }
        };

        for outcome in &self.outcomes {
            for record in outcome.records() {
                let side = match record.source() {
                    SourceSystem::Ledger => 0,
                    SourceSystem::Bank => 1,
                };
                if !mark(side, record.index()) {
                    return false;
                }
            }
        }
        for err in &self.rejected {
            let side = match err.system {
                SourceSystem::Ledger => 0,
                SourceSystem::Bank => 1,
            };
            if !mark(side, err.index) {
                return false;
            }
        }
        seen.iter().all(|side| side.iter().all(|s| *s))
    }

    pub fn summary(&self) -> ReconciliationSummary {
        let mut counts: BTreeMap<Classification, usize> =
            Classification::ALL.iter().map(|c| (*c, 0)).collect();
        for outcome in &self.outcomes {
            *counts.entry(outcome.classification()).or_insert(0) += 1;
        }
        ReconciliationSummary {
            counts,
            rejected: self.rejected.len(),
            record_coverage: self.record_coverage(),
        }
    }
}

/// Outcome counts per classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub counts: BTreeMap<Classification, usize>,
    pub rejected: usize,
    pub record_coverage: usize,
}

impl ReconciliationSummary {
    pub fn count(&self, classification: Classification) -> usize {
        self.counts.get(&classification).copied().unwrap_or(0)
    }

    pub fn total_outcomes(&self) -> usize {
        self.counts.values().sum()
    }

    /// Share of outcomes that are clean matches, as a percentage.
    pub fn match_rate(&self) -> f64 {
        let total = self.total_outcomes();
        if total == 0 {
            return 0.0;
        }
        self.count(Classification::Match) as f64 * 100.0 / total as f64
    }
}

impl fmt::Display for ReconciliationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Reconciliation Summary ===")?;
        for (classification, count) in &self.counts {
            writeln!(f, "{:<16}{}", classification.as_str(), count)?;
        }
        writeln!(f, "Rejected:       {}", self.rejected)?;
        writeln!(f, "Records:        {}", self.record_coverage)?;
        writeln!(f, "Match rate:     {:.1}%", self.match_rate())
    }
}
