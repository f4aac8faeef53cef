use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// ISO 4217 currency code.
///
/// Codes are stored upper-cased. Use [`CurrencyCode::parse`] when the
/// input comes from an untrusted feed; [`CurrencyCode::new`] accepts
/// anything and is meant for literals.
///
/// # Examples
///
/// ```
/// use ledger_recon::core::currency::CurrencyCode;
///
/// let eur = CurrencyCode::new("eur");
/// assert_eq!(eur.as_str(), "EUR");
/// assert!(CurrencyCode::parse("EURO").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_ascii_uppercase())
    }

    /// Parse a three-letter alphabetic code, returning `None` for anything else.
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(Self::new(code))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Errors arising from FX rate operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FxError {
    #[error("FX rate must be positive, got {rate} for {pair} on {date}")]
    InvalidRate {
        pair: CurrencyPair,
        date: NaiveDate,
        rate: Decimal,
    },
    #[error("invalid currency pair '{0}', expected BASE/QUOTE or BASEQUOTE")]
    InvalidPair(String),
    #[error("unreadable rate observation for {pair}: {reason}")]
    InvalidObservation { pair: String, reason: String },
}

/// One dated quote as it arrives from the historical rate feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRate {
    pub pair: String,
    pub date: String,
    pub rate: String,
}

/// No FX rate could be found to convert `currency` into `base` on `date`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("no FX rate for {currency} -> {base} effective on {date}")]
pub struct MissingRateError {
    pub currency: CurrencyCode,
    pub base: CurrencyCode,
    pub date: NaiveDate,
}

/// The converted amount does not fit in a `Decimal`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{amount} {currency} at {rate} overflows when converted to {base} on {date}")]
pub struct ConversionOverflowError {
    pub currency: CurrencyCode,
    pub base: CurrencyCode,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub rate: Decimal,
}

/// Why an amount could not be expressed in the base currency.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error(transparent)]
    MissingRate(#[from] MissingRateError),
    #[error(transparent)]
    Overflow(#[from] ConversionOverflowError),
}

/// A quoted currency pair: one unit of `base` costs `rate` units of `quote`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    pub base: CurrencyCode,
    pub quote: CurrencyCode,
}

impl CurrencyPair {
    pub fn new(base: CurrencyCode, quote: CurrencyCode) -> Self {
        Self { base, quote }
    }

    /// The same pair quoted the other way round.
    pub fn inverse(&self) -> Self {
        Self::new(self.quote.clone(), self.base.clone())
    }

    /// Whether `currency` is one of the two legs.
    pub fn involves(&self, currency: &CurrencyCode) -> bool {
        &self.base == currency || &self.quote == currency
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for CurrencyPair {
    type Err = FxError;

    /// Accepts `EUR/USD` as well as the compact `EURUSD` market form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (base, quote) = match s.split_once('/') {
            Some(legs) => legs,
            None if s.len() == 6 && s.is_ascii() => s.split_at(3),
            None => return Err(FxError::InvalidPair(s.to_string())),
        };
        match (CurrencyCode::parse(base), CurrencyCode::parse(quote)) {
            (Some(base), Some(quote)) => Ok(Self::new(base, quote)),
            _ => Err(FxError::InvalidPair(s.to_string())),
        }
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = FxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> Self {
        pair.to_string()
    }
}

/// Dated FX rate table used both for conversion and as the historical
/// series feeding the risk engine.
///
/// Rates are stored per quoted pair and date. A lookup for the opposite
/// direction inverts the stored quote. The effective rate for a date is
/// the latest observation on or before that date.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use ledger_recon::core::currency::{CurrencyCode, CurrencyPair, FxRateTable};
/// use rust_decimal_macros::dec;
///
/// let eur = CurrencyCode::new("EUR");
/// let usd = CurrencyCode::new("USD");
/// let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
///
/// let mut rates = FxRateTable::new(eur.clone());
/// rates.set_rate(CurrencyPair::new(eur.clone(), usd.clone()), day, dec!(1.25)).unwrap();
///
/// let converted = rates.convert_to_base(dec!(1000), &usd, day).unwrap();
/// assert_eq!(converted, dec!(800));
/// ```
#[derive(Debug, Clone)]
pub struct FxRateTable {
    /// The currency every amount is normalised into.
    pub base_currency: CurrencyCode,
    series: HashMap<CurrencyPair, BTreeMap<NaiveDate, Decimal>>,
}

impl FxRateTable {
    pub fn new(base_currency: CurrencyCode) -> Self {
        Self {
            base_currency,
            series: HashMap::new(),
        }
    }

    /// Build a table from raw feed rows. Unreadable rows are skipped and
    /// returned alongside the table.
    pub fn from_raw(base_currency: CurrencyCode, rows: &[RawRate]) -> (Self, Vec<FxError>) {
        let mut table = Self::new(base_currency);
        let mut errors = Vec::new();
        for row in rows {
            if let Err(err) = table.load_row(row) {
                log::warn!("{}", err);
                errors.push(err);
            }
        }
        log::info!(
            "loaded {} rate observations across {} pairs ({} rejected)",
            rows.len() - errors.len(),
            table.series.len(),
            errors.len()
        );
        (table, errors)
    }

    fn load_row(&mut self, row: &RawRate) -> Result<(), FxError> {
        let pair: CurrencyPair = row.pair.parse()?;
        let invalid = |reason: String| FxError::InvalidObservation {
            pair: row.pair.clone(),
            reason,
        };
        let date = crate::core::record::parse_date(&row.date)
            .ok_or_else(|| invalid(format!("unparseable date '{}'", row.date)))?;
        let rate = crate::core::record::parse_amount(&row.rate)
            .ok_or_else(|| invalid(format!("unparseable rate '{}'", row.rate)))?;
        self.set_rate(pair, date, rate)
    }

    /// Record the quote for `pair` on `date`, replacing any earlier value.
    pub fn set_rate(
        &mut self,
        pair: CurrencyPair,
        date: NaiveDate,
        rate: Decimal,
    ) -> Result<(), FxError> {
        if rate <= Decimal::ZERO {
            return Err(FxError::InvalidRate { pair, date, rate });
        }
        self.series.entry(pair).or_default().insert(date, rate);
        Ok(())
    }

    /// Every pair with at least one observation, sorted.
    pub fn pairs(&self) -> Vec<CurrencyPair> {
        let mut pairs: Vec<CurrencyPair> = self.series.keys().cloned().collect();
        pairs.sort();
        pairs
    }

    /// Effective rate for `pair` on `date`, inverting the opposite quote if needed.
    pub fn rate_on(&self, pair: &CurrencyPair, date: NaiveDate) -> Option<Decimal> {
        if pair.base == pair.quote {
            return Some(Decimal::ONE);
        }
        if let Some(rate) = Self::effective(self.series.get(pair), date) {
            return Some(rate);
        }
        Self::effective(self.series.get(&pair.inverse()), date).map(|r| Decimal::ONE / r)
    }

    fn effective(series: Option<&BTreeMap<NaiveDate, Decimal>>, date: NaiveDate) -> Option<Decimal> {
        series?.range(..=date).next_back().map(|(_, rate)| *rate)
    }

    /// Convert `amount` denominated in `currency` into the base currency.
    pub fn convert_to_base(
        &self,
        amount: Decimal,
        currency: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<Decimal, ConversionError> {
        // Price of one unit of `currency` in base units.
        let pair = CurrencyPair::new(currency.clone(), self.base_currency.clone());
        let rate = self.rate_on(&pair, date).ok_or_else(|| MissingRateError {
            currency: currency.clone(),
            base: self.base_currency.clone(),
            date,
        })?;
        let converted = amount.checked_mul(rate).ok_or_else(|| ConversionOverflowError {
            currency: currency.clone(),
            base: self.base_currency.clone(),
            date,
            amount,
            rate,
        })?;
        Ok(converted)
    }

    /// Find the stored pair linking `currency` with the base currency, in
    /// whichever direction it is quoted.
    pub fn quoted_pair_for(&self, currency: &CurrencyCode) -> Option<CurrencyPair> {
        let direct = CurrencyPair::new(self.base_currency.clone(), currency.clone());
        if self.series.contains_key(&direct) {
            return Some(direct);
        }
        let inverse = direct.inverse();
        self.series.contains_key(&inverse).then_some(inverse)
    }

    /// Historical observations of a stored pair as `(date, rate)` in ascending date order.
    pub fn history(&self, pair: &CurrencyPair) -> Vec<(NaiveDate, f64)> {
        self.series
            .get(pair)
            .map(|series| {
                series
                    .iter()
                    .filter_map(|(date, rate)| rate.to_f64().map(|r| (*date, r)))
                    .collect()
            })
            .unwrap_or_default()
    }
}
