use crate::core::currency::CurrencyCode;
use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which of the two feeds a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceSystem {
    /// Internal ERP / treasury ledger.
    Ledger,
    /// Bank statement feed.
    Bank,
}

impl fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSystem::Ledger => write!(f, "ledger"),
            SourceSystem::Bank => write!(f, "bank"),
        }
    }
}

/// A record as handed over by ingestion: every field still textual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_id: String,
    #[serde(default)]
    pub reference_key: Option<String>,
    pub date: String,
    pub currency_code: String,
    pub amount: String,
    #[serde(default)]
    pub description: String,
}

/// Why a raw record could not be admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ValidationReason {
    UnparseableDate(String),
    NonFiniteAmount(String),
    InvalidCurrency(String),
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReason::UnparseableDate(v) => write!(f, "unparseable date '{}'", v),
            ValidationReason::NonFiniteAmount(v) => write!(f, "non-finite amount '{}'", v),
            ValidationReason::InvalidCurrency(v) => write!(f, "invalid currency code '{}'", v),
        }
    }
}

/// A malformed input record. The record is excluded from matching; the
/// batch carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{system} record #{index} (ref {reference:?}) rejected: {reason}")]
pub struct RecordValidationError {
    pub system: SourceSystem,
    pub index: usize,
    pub reference: Option<String>,
    pub reason: ValidationReason,
}

/// A validated transaction record. Immutable once built.
///
/// `index` is the record's position in its source sequence and is used as
/// the final tie-breaker when several records compete for the same match.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use ledger_recon::core::currency::CurrencyCode;
/// use ledger_recon::core::record::{SourceSystem, TransactionRecord};
/// use rust_decimal_macros::dec;
///
/// let record = TransactionRecord::new(
///     SourceSystem::Ledger,
///     0,
///     NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
///     CurrencyCode::new("EUR"),
///     dec!(1000.00),
/// )
/// .with_reference("A1");
///
/// assert_eq!(record.reference(), Some("A1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    source: SourceSystem,
    index: usize,
    source_id: String,
    reference: Option<String>,
    date: NaiveDate,
    currency: CurrencyCode,
    amount: Decimal,
    description: String,
}

impl TransactionRecord {
    pub fn new(
        source: SourceSystem,
        index: usize,
        date: NaiveDate,
        currency: CurrencyCode,
        amount: Decimal,
    ) -> Self {
        Self {
            source,
            index,
            source_id: source.to_string(),
            reference: None,
            date,
            currency,
            amount,
            description: String::new(),
        }
    }

    /// Set the reference key. Blank keys are treated as absent.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        let reference = reference.into().trim().to_string();
        self.reference = (!reference.is_empty()).then_some(reference);
        self
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Validate a raw record coming from `source` at position `index`.
    pub fn from_raw(
        source: SourceSystem,
        index: usize,
        raw: &RawRecord,
    ) -> Result<Self, RecordValidationError> {
        let reject = |reason| RecordValidationError {
            system: source,
            index,
            reference: raw.reference_key.clone(),
            reason,
        };

        let date = parse_date(&raw.date)
            .ok_or_else(|| reject(ValidationReason::UnparseableDate(raw.date.clone())))?;
        let amount = parse_amount(&raw.amount)
            .ok_or_else(|| reject(ValidationReason::NonFiniteAmount(raw.amount.clone())))?;
        let currency = CurrencyCode::parse(&raw.currency_code)
            .ok_or_else(|| reject(ValidationReason::InvalidCurrency(raw.currency_code.clone())))?;

        let mut record = Self::new(source, index, date, currency, amount)
            .with_source_id(raw.source_id.clone())
            .with_description(raw.description.clone());
        if let Some(reference) = &raw.reference_key {
            record = record.with_reference(reference.clone());
        }
        Ok(record)
    }

    // --- Accessors ---

    pub fn source(&self) -> SourceSystem {
        self.source
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Accepts a plain ISO-8601 date or a full RFC 3339 timestamp.
pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
}

pub(crate) fn parse_amount(value: &str) -> Option<Decimal> {
    let value = value.trim();
    Decimal::from_str(value)
        .ok()
        .or_else(|| Decimal::from_scientific(value).ok())
}

/// Validate a whole feed, splitting it into admitted records and rejections.
pub fn validate_all(
    source: SourceSystem,
    raw: &[RawRecord],
) -> (Vec<TransactionRecord>, Vec<RecordValidationError>) {
    let mut records = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();
    for (index, item) in raw.iter().enumerate() {
        match TransactionRecord::from_raw(source, index, item) {
            Ok(record) => records.push(record),
            Err(err) => {
                log::warn!("{}", err);
                rejected.push(err);
            }
        }
    }
    (records, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(date: &str, amount: &str, currency: &str) -> RawRecord {
        RawRecord {
            source_id: "ERP".to_string(),
            reference_key: Some("A1".to_string()),
            date: date.to_string(),
            currency_code: currency.to_string(),
            amount: amount.to_string(),
            description: "invoice".to_string(),
        }
    }

    #[test]
    fn test_from_raw_valid() {
        let record =
            TransactionRecord::from_raw(SourceSystem::Ledger, 3, &raw("2024-01-05", "1000.00", "eur"))
                .unwrap();
        assert_eq!(record.index(), 3);
        assert_eq!(record.amount(), dec!(1000.00));
        assert_eq!(record.currency().as_str(), "EUR");
        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(record.source_id(), "ERP");
        assert_eq!(record.description(), "invoice");
    }

    #[test]
    fn test_from_raw_accepts_timestamp_and_scientific() {
        let record = TransactionRecord::from_raw(
            SourceSystem::Bank,
            0,
            &raw("2024-01-05T13:45:00+01:00", "1.5e3", "USD"),
        )
        .unwrap();
        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(record.amount(), dec!(1500));
    }

    #[test]
    fn test_rejects_bad_date() {
        let err = TransactionRecord::from_raw(SourceSystem::Bank, 7, &raw("05/01/2024", "1", "EUR"))
            .unwrap_err();
        assert_eq!(err.index, 7);
        assert_eq!(err.system, SourceSystem::Bank);
        assert!(matches!(err.reason, ValidationReason::UnparseableDate(_)));
    }

    #[test]
    fn test_rejects_non_finite_amount() {
        for amount in ["NaN", "inf", "-Infinity", "", "12,5"] {
            let err =
                TransactionRecord::from_raw(SourceSystem::Ledger, 0, &raw("2024-01-05", amount, "EUR"))
                    .unwrap_err();
            assert!(matches!(err.reason, ValidationReason::NonFiniteAmount(_)), "{amount}");
        }
    }

    #[test]
    fn test_rejects_bad_currency() {
        let err = TransactionRecord::from_raw(SourceSystem::Ledger, 0, &raw("2024-01-05", "1", "EURO"))
            .unwrap_err();
        assert!(matches!(err.reason, ValidationReason::InvalidCurrency(_)));
    }

    #[test]
    fn test_blank_reference_is_absent() {
        let mut input = raw("2024-01-05", "1", "EUR");
        input.reference_key = Some("   ".to_string());
        let record = TransactionRecord::from_raw(SourceSystem::Ledger, 0, &input).unwrap();
        assert_eq!(record.reference(), None);
    }

    #[test]
    fn test_validate_all_splits() {
        let feed = vec![
            raw("2024-01-05", "1", "EUR"),
            raw("not-a-date", "1", "EUR"),
            raw("2024-01-06", "2", "USD"),
        ];
        let (records, rejected) = validate_all(SourceSystem::Ledger, &feed);
        assert_eq!(records.len(), 2);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].index, 1);
        assert_eq!(records[1].index(), 2);
    }
}
