use crate::core::config::{ConfigurationError, PipelineConfig};
use crate::core::currency::CurrencyCode;
use crate::core::record::{validate_all, RawRecord, SourceSystem, TransactionRecord};
use crate::reconciliation::outcome::{ClassifiedOutcome, MismatchReason, ReconciliationResult};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Inclusive tolerances applied to a candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchTolerance {
    pub amount: Decimal,
    pub date_days: i64,
}

impl MatchTolerance {
    pub fn new(amount: Decimal, date_days: i64) -> Self {
        Self { amount, date_days }
    }

    pub fn exact() -> Self {
        Self::new(Decimal::ZERO, 0)
    }
}

/// Key used to bring ledger and bank candidates together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchKey {
    /// The shared business reference.
    Reference(String),
    /// Records without a reference: same currency and exact amount. Dates
    /// are checked against the day window when pairing inside the group.
    Fallback { currency: CurrencyCode, amount: Decimal },
}

impl MatchKey {
    fn for_record(record: &TransactionRecord, fallback: bool) -> Option<Self> {
        match record.reference() {
            Some(reference) => Some(MatchKey::Reference(reference.to_string())),
            None if fallback => Some(MatchKey::Fallback {
                currency: record.currency().clone(),
                amount: record.amount().normalize(),
            }),
            None => None,
        }
    }
}

#[derive(Debug, Default)]
struct Candidates {
    ledger: Vec<usize>,
    bank: Vec<usize>,
}

/// Tolerance-aware full outer join between a ledger and a bank feed.
///
/// Every admitted record lands in exactly one outcome and the output order
/// depends only on the inputs:
///
/// 1. Keys are visited in order of first appearance in the ledger, then
///    bank-only keys in order of first appearance in the bank feed.
/// 2. Inside a key, candidates on each side are sorted by ascending date,
///    then ascending record index, and paired greedily.
/// 3. Candidates left over on the larger side become `MISSING_*` outcomes.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use ledger_recon::core::currency::CurrencyCode;
/// use ledger_recon::core::record::{SourceSystem, TransactionRecord};
/// use ledger_recon::reconciliation::{Classification, MatchTolerance, Reconciler};
/// use rust_decimal_macros::dec;
///
/// let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
/// let eur = CurrencyCode::new("EUR");
/// let ledger = vec![TransactionRecord::new(SourceSystem::Ledger, 0, day, eur.clone(), dec!(1000.00)).with_reference("A1")];
/// let bank = vec![TransactionRecord::new(SourceSystem::Bank, 0, day, eur, dec!(999.50)).with_reference("A1")];
///
/// let reconciler = Reconciler::new(MatchTolerance::new(dec!(1.00), 0));
/// let outcomes = reconciler.reconcile_records(ledger, bank);
/// assert_eq!(outcomes[0].classification(), Classification::Match);
/// ```
#[derive(Debug, Clone)]
pub struct Reconciler {
    tolerance: MatchTolerance,
    fallback_matching: bool,
}

impl Reconciler {
    pub fn new(tolerance: MatchTolerance) -> Self {
        Self {
            tolerance,
            fallback_matching: true,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(MatchTolerance::new(
            config.amount_tolerance,
            config.date_tolerance_days,
        ))
        .with_fallback_matching(config.fallback_matching)
    }

    /// Enable or disable currency/amount/date pairing of unreferenced records.
    pub fn with_fallback_matching(mut self, enabled: bool) -> Self {
        self.fallback_matching = enabled;
        self
    }

    pub fn tolerance(&self) -> MatchTolerance {
        self.tolerance
    }

    /// Validate both feeds and reconcile the admitted records.
    ///
    /// Rejected records are reported in the result, never matched.
    pub fn reconcile(&self, ledger: &[RawRecord], bank: &[RawRecord]) -> ReconciliationResult {
        let (ledger_records, mut rejected) = validate_all(SourceSystem::Ledger, ledger);
        let (bank_records, bank_rejected) = validate_all(SourceSystem::Bank, bank);
        rejected.extend(bank_rejected);

        let outcomes = self.reconcile_records(ledger_records, bank_records);
        let result = ReconciliationResult::new(outcomes, rejected);

        let summary = result.summary();
        log::info!(
            "reconciled {} ledger / {} bank records into {} outcomes ({} rejected)",
            ledger.len(),
            bank.len(),
            result.len(),
            summary.rejected
        );
        result
    }

    /// Reconcile already validated records.
    pub fn reconcile_records(
        &self,
        ledger: Vec<TransactionRecord>,
        bank: Vec<TransactionRecord>,
    ) -> Vec<ClassifiedOutcome> {
        let mut index: HashMap<MatchKey, Candidates> = HashMap::new();
        let mut key_order: Vec<MatchKey> = Vec::new();
        let mut unkeyed_ledger = Vec::new();
        let mut unkeyed_bank = Vec::new();

        for (pos, record) in ledger.iter().enumerate() {
            match MatchKey::for_record(record, self.fallback_matching) {
                Some(key) => {
                    let entry = index.entry(key.clone()).or_insert_with(|| {
                        key_order.push(key);
                        Candidates::default()
                    });
                    entry.ledger.push(pos);
                }
                None => unkeyed_ledger.push(pos),
            }
        }
        for (pos, record) in bank.iter().enumerate() {
            match MatchKey::for_record(record, self.fallback_matching) {
                Some(key) => {
                    let entry = index.entry(key.clone()).or_insert_with(|| {
                        key_order.push(key);
                        Candidates::default()
                    });
                    entry.bank.push(pos);
                }
                None => unkeyed_bank.push(pos),
            }
        }

        let mut ledger: Vec<Option<TransactionRecord>> = ledger.into_iter().map(Some).collect();
        let mut bank: Vec<Option<TransactionRecord>> = bank.into_iter().map(Some).collect();
        let mut outcomes = Vec::with_capacity(ledger.len().max(bank.len()));

        for key in &key_order {
            let Some(candidates) = index.get_mut(key) else {
                continue;
            };
            sort_candidates(&mut candidates.ledger, &ledger);
            sort_candidates(&mut candidates.bank, &bank);

            let pairs = match key {
                MatchKey::Reference(_) => pair_in_order(&candidates.ledger, &candidates.bank),
                MatchKey::Fallback { .. } => {
                    self.pair_within_window(&candidates.ledger, &candidates.bank, &ledger, &bank)
                }
            };
            log::debug!(
                "key {:?}: {} ledger / {} bank candidates, {} pairs",
                key,
                candidates.ledger.len(),
                candidates.bank.len(),
                pairs.iter().filter(|(l, b)| l.is_some() && b.is_some()).count()
            );

            for (l, b) in pairs {
                let l = l.and_then(|pos| ledger[pos].take());
                let b = b.and_then(|pos| bank[pos].take());
                match (l, b) {
                    (Some(l), Some(b)) => {
                        let mismatch = self.classify_pair(&l, &b);
                        outcomes.push(ClassifiedOutcome::paired(l, b, mismatch));
                    }
                    (Some(l), None) => outcomes.push(ClassifiedOutcome::missing_bank(l)),
                    (None, Some(b)) => outcomes.push(ClassifiedOutcome::missing_ledger(b)),
                    (None, None) => {}
                }
            }
        }

        outcomes.extend(
            unkeyed_ledger
                .into_iter()
                .filter_map(|pos| ledger[pos].take())
                .map(ClassifiedOutcome::missing_bank),
        );
        outcomes.extend(
            unkeyed_bank
                .into_iter()
                .filter_map(|pos| bank[pos].take())
                .map(ClassifiedOutcome::missing_ledger),
        );
        outcomes
    }

    /// `None` when the pair is within tolerance, otherwise what broke it.
    pub fn classify_pair(
        &self,
        ledger: &TransactionRecord,
        bank: &TransactionRecord,
    ) -> Option<MismatchReason> {
        if ledger.currency() != bank.currency() {
            return Some(MismatchReason::Currency);
        }
        // A difference outside the Decimal range is never within tolerance.
        let amount_ok = ledger
            .amount()
            .checked_sub(bank.amount())
            .is_some_and(|diff| diff.abs() <= self.tolerance.amount);
        let date_ok = self.within_window(ledger, bank);
        match (amount_ok, date_ok) {
            (true, true) => None,
            (false, true) => Some(MismatchReason::Amount),
            (true, false) => Some(MismatchReason::Date),
            (false, false) => Some(MismatchReason::AmountAndDate),
        }
    }

    fn within_window(&self, a: &TransactionRecord, b: &TransactionRecord) -> bool {
        (a.date() - b.date()).num_days().abs() <= self.tolerance.date_days
    }

    /// Greedy pairing for fallback keys: each ledger candidate takes the
    /// earliest free bank candidate whose date is inside the window.
    fn pair_within_window(
        &self,
        ledger_pos: &[usize],
        bank_pos: &[usize],
        ledger: &[Option<TransactionRecord>],
        bank: &[Option<TransactionRecord>],
    ) -> Vec<(Option<usize>, Option<usize>)> {
        let mut used = vec![false; bank_pos.len()];
        let mut pairs = Vec::with_capacity(ledger_pos.len() + bank_pos.len());

        for &l in ledger_pos {
            let partner = ledger[l].as_ref().and_then(|lrec| {
                bank_pos.iter().enumerate().position(|(slot, &b)| {
                    !used[slot]
                        && bank[b]
                            .as_ref()
                            .map(|brec| self.within_window(lrec, brec))
                            .unwrap_or(false)
                })
            });
            match partner {
                Some(slot) => {
                    used[slot] = true;
                    pairs.push((Some(l), Some(bank_pos[slot])));
                }
                None => pairs.push((Some(l), None)),
            }
        }
        pairs.extend(
            bank_pos
                .iter()
                .zip(used)
                .filter(|(_, used)| !used)
                .map(|(&b, _)| (None, Some(b))),
        );
        pairs
    }
}

/// Reconcile two raw feeds with the given tolerances.
///
/// Negative tolerances are rejected before any record is read.
pub fn reconcile(
    ledger: &[RawRecord],
    bank: &[RawRecord],
    amount_tolerance: Decimal,
    date_tolerance_days: i64,
) -> Result<ReconciliationResult, ConfigurationError> {
    let config = PipelineConfig {
        amount_tolerance,
        date_tolerance_days,
        ..Default::default()
    };
    config.validate()?;
    Ok(Reconciler::from_config(&config).reconcile(ledger, bank))
}

fn sort_candidates(positions: &mut [usize], records: &[Option<TransactionRecord>]) {
    positions.sort_by_key(|&pos| {
        records[pos]
            .as_ref()
            .map(|r| (r.date(), r.index()))
    });
}

/// Zip two sorted candidate lists; the tail of the longer list stays unpaired.
fn pair_in_order(ledger: &[usize], bank: &[usize]) -> Vec<(Option<usize>, Option<usize>)> {
    let len = ledger.len().max(bank.len());
    (0..len)
        .map(|i| (ledger.get(i).copied(), bank.get(i).copied()))
        .collect()
}
