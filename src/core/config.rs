//! Run-level configuration.
//!
//! Every option has a default so a config file only needs to name the
//! values it changes. Validation happens once, before any work starts.

use crate::core::currency::CurrencyCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Out-of-range or unreadable configuration. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("amount_tolerance must be non-negative, got {0}")]
    NegativeAmountTolerance(Decimal),
    #[error("date_tolerance_days must be non-negative, got {0}")]
    NegativeDateTolerance(i64),
    #[error("base_currency must be a three-letter ISO 4217 code, got '{0}'")]
    InvalidBaseCurrency(String),
    #[error("num_paths must be positive, got {0}")]
    NonPositivePaths(usize),
    #[error("horizon_days must be positive, got {0}")]
    NonPositiveHorizon(usize),
    #[error("confidence_level must lie in (0, 1), got {0}")]
    ConfidenceOutOfRange(f64),
    #[error("num_trees must be positive, got {0}")]
    NonPositiveTrees(usize),
    #[error("subsample_size must be at least 2, got {0}")]
    SubsampleTooSmall(usize),
    #[error("anomaly_threshold must lie in (0, 1], got {0}")]
    ThresholdOutOfRange(f64),
    #[error("max_tree_depth must be positive when set")]
    ZeroTreeDepth,
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Which simulated value the VaR loss distribution is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarBasis {
    /// Value at the end of the horizon.
    #[default]
    Terminal,
    /// Worst mark reached anywhere along the path.
    PathMinimum,
}

/// Empirical percentile convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentileMethod {
    /// Smallest sample with at least `p` of the mass at or below it.
    #[default]
    NearestRank,
    /// Linear interpolation between the two closest order statistics.
    Interpolated,
}

/// Options consumed by the reconciliation, risk and anomaly engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Largest absolute amount difference still classified as a match (inclusive).
    pub amount_tolerance: Decimal,
    /// Largest date distance in days still classified as a match (inclusive).
    pub date_tolerance_days: i64,
    pub base_currency: CurrencyCode,
    pub num_paths: usize,
    pub horizon_days: usize,
    pub confidence_level: f64,
    pub num_trees: usize,
    pub subsample_size: usize,
    pub anomaly_threshold: f64,
    pub random_seed: u64,
    pub var_basis: VarBasis,
    pub percentile_method: PercentileMethod,
    /// Pair records lacking a reference key on currency, amount and date.
    pub fallback_matching: bool,
    /// Overrides the `ceil(log2(subsample_size))` depth cap.
    pub max_tree_depth: Option<usize>,
    /// Worker threads for simulation and tree building; 0 means one per core.
    pub worker_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: dec!(0.01),
            date_tolerance_days: 0,
            base_currency: CurrencyCode::new("EUR"),
            num_paths: 1_000,
            horizon_days: 30,
            confidence_level: 0.95,
            num_trees: 100,
            subsample_size: 256,
            anomaly_threshold: 0.6,
            random_seed: 42,
            var_basis: VarBasis::Terminal,
            percentile_method: PercentileMethod::NearestRank,
            fallback_matching: true,
            max_tree_depth: None,
            worker_threads: 0,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Check every option range. The first violation wins.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.amount_tolerance < Decimal::ZERO {
            return Err(ConfigurationError::NegativeAmountTolerance(self.amount_tolerance));
        }
        if self.date_tolerance_days < 0 {
            return Err(ConfigurationError::NegativeDateTolerance(self.date_tolerance_days));
        }
        if CurrencyCode::parse(self.base_currency.as_str()).is_none() {
            return Err(ConfigurationError::InvalidBaseCurrency(
                self.base_currency.to_string(),
            ));
        }
        if self.num_paths == 0 {
            return Err(ConfigurationError::NonPositivePaths(self.num_paths));
        }
        if self.horizon_days == 0 {
            return Err(ConfigurationError::NonPositiveHorizon(self.horizon_days));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ConfigurationError::ConfidenceOutOfRange(self.confidence_level));
        }
        if self.num_trees == 0 {
            return Err(ConfigurationError::NonPositiveTrees(self.num_trees));
        }
        if self.subsample_size < 2 {
            return Err(ConfigurationError::SubsampleTooSmall(self.subsample_size));
        }
        if !(self.anomaly_threshold > 0.0 && self.anomaly_threshold <= 1.0) {
            return Err(ConfigurationError::ThresholdOutOfRange(self.anomaly_threshold));
        }
        if self.max_tree_depth == Some(0) {
            return Err(ConfigurationError::ZeroTreeDepth);
        }
        Ok(())
    }

    /// Number of worker threads to fan work out over.
    pub fn workers(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}
