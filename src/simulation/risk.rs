//! Monte Carlo FX risk: per-pair GBM simulation of net open positions.

use crate::core::config::{ConfigurationError, PercentileMethod, PipelineConfig, VarBasis};
use crate::core::currency::{CurrencyCode, CurrencyPair, FxRateTable};
use crate::core::parallel::par_map;
use crate::core::position::NetOpenPosition;
use crate::simulation::gbm::{GbmParameters, InsufficientDataError};
use crate::simulation::seed::{derive_seed, RISK_DOMAIN};
use crate::simulation::var::{expected_shortfall, loss_distribution, value_at_risk, ExposureLeg};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fewer paths than this produce a low-confidence warning.
pub const MIN_CONFIDENT_PATHS: usize = 100;

/// Simulated paths for one series plus the VaR of a unit long position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub parameters: GbmParameters,
    pub paths: Vec<Vec<f64>>,
    /// VaR of one unit of the series' base currency, as a fraction of that unit.
    pub value_at_risk: f64,
    pub low_confidence: bool,
}

/// Risk figures for one currency pair against its net open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFigure {
    pub currency_pair: CurrencyPair,
    pub exposure_currency: CurrencyCode,
    /// Net open position in base currency.
    pub exposure: Decimal,
    pub leg: ExposureLeg,
    pub value_at_risk: f64,
    pub expected_shortfall: f64,
    pub confidence_level: f64,
    pub num_paths: usize,
    pub horizon_days: usize,
    pub as_of_date: NaiveDate,
    pub drift: f64,
    pub volatility: f64,
    pub mean_terminal_rate: f64,
    pub low_confidence: bool,
}

/// Figures for every simulated pair and the pairs that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub figures: Vec<RiskFigure>,
    pub skipped: Vec<InsufficientDataError>,
}

/// Seeded GBM simulator with VaR estimation.
///
/// Identical seed and inputs give bit-identical paths regardless of
/// `workers`.
#[derive(Debug, Clone)]
pub struct MonteCarloEngine {
    pub num_paths: usize,
    pub horizon_days: usize,
    pub confidence_level: f64,
    pub seed: u64,
    pub basis: VarBasis,
    pub percentile_method: PercentileMethod,
    pub workers: usize,
}

impl MonteCarloEngine {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            num_paths: config.num_paths,
            horizon_days: config.horizon_days,
            confidence_level: config.confidence_level,
            seed: config.random_seed,
            basis: config.var_basis,
            percentile_method: config.percentile_method,
            workers: config.workers(),
        }
    }

    fn warn_if_noisy(&self, label: &str) -> bool {
        let low = self.num_paths < MIN_CONFIDENT_PATHS;
        if low {
            log::warn!(
                "{}: only {} paths simulated, VaR is statistically noisy",
                label,
                self.num_paths
            );
        }
        low
    }

    /// Simulate a raw price series and report the VaR of a unit long position.
    pub fn simulate(&self, series: &[f64], label: &str) -> Result<SimulationOutcome, InsufficientDataError> {
        let parameters = GbmParameters::estimate(series, label)?;
        let low_confidence = self.warn_if_noisy(label);
        let paths = parameters.paths(self.horizon_days, self.num_paths, self.seed, self.workers);
        let losses = loss_distribution(&paths, 1.0, ExposureLeg::Base, self.basis);
        let value_at_risk = value_at_risk(&losses, self.confidence_level, self.percentile_method);

        Ok(SimulationOutcome {
            parameters,
            paths,
            value_at_risk,
            low_confidence,
        })
    }

    /// Simulate every non-base currency of `positions` against the base
    /// currency of `rates`.
    ///
    /// Pairs run in parallel, each on its own seed; a pair without enough
    /// history is skipped and reported.
    pub fn assess(&self, positions: &NetOpenPosition, rates: &FxRateTable) -> RiskAssessment {
        let currencies: Vec<(CurrencyCode, Decimal)> = positions
            .iter()
            .filter(|(ccy, _)| **ccy != rates.base_currency)
            .map(|(ccy, amount)| (ccy.clone(), *amount))
            .collect();

        // Pairs are the outer fan-out; each pair simulates its paths serially.
        let serial = Self {
            workers: 1,
            ..self.clone()
        };
        let results = par_map(self.workers, currencies.len(), |i| {
            let (currency, exposure) = &currencies[i];
            serial.assess_currency(i, currency, *exposure, rates)
        });

        let mut assessment = RiskAssessment::default();
        for result in results {
            match result {
                Ok(figure) => assessment.figures.push(figure),
                Err(err) => {
                    log::warn!("skipping risk simulation: {}", err);
                    assessment.skipped.push(err);
                }
            }
        }
        log::info!(
            "simulated {} currency pairs ({} skipped), {} paths x {} days each",
            assessment.figures.len(),
            assessment.skipped.len(),
            self.num_paths,
            self.horizon_days
        );
        assessment
    }

    fn assess_currency(
        &self,
        index: usize,
        currency: &CurrencyCode,
        exposure: Decimal,
        rates: &FxRateTable,
    ) -> Result<RiskFigure, InsufficientDataError> {
        let Some(pair) = rates.quoted_pair_for(currency) else {
            return Err(InsufficientDataError {
                series: format!("{}/{}", rates.base_currency, currency),
                observations: 0,
            });
        };
        let leg = if &pair.base == currency {
            ExposureLeg::Base
        } else {
            ExposureLeg::Quote
        };

        let history = rates.history(&pair);
        let label = pair.to_string();
        let series: Vec<f64> = history.iter().map(|(_, rate)| *rate).collect();
        let parameters = GbmParameters::estimate(&series, &label)?;
        let as_of_date = history
            .last()
            .map(|(date, _)| *date)
            .unwrap_or(NaiveDate::MIN);
        let low_confidence = self.warn_if_noisy(&label);

        let seed = derive_seed(self.seed ^ RISK_DOMAIN, index as u64);
        let paths = parameters.paths(self.horizon_days, self.num_paths, seed, self.workers);

        let exposure_f64 = exposure.to_f64().unwrap_or(0.0);
        let losses = loss_distribution(&paths, exposure_f64, leg, self.basis);
        let var = value_at_risk(&losses, self.confidence_level, self.percentile_method);
        let es = expected_shortfall(&losses, self.confidence_level, self.percentile_method);
        let mean_terminal_rate = if paths.is_empty() {
            parameters.spot
        } else {
            paths.iter().filter_map(|p| p.last()).sum::<f64>() / paths.len() as f64
        };

        log::debug!(
            "{}: exposure {} {}, mu {:.6}, sigma {:.6}, VaR {:.2}",
            label,
            exposure,
            rates.base_currency,
            parameters.drift,
            parameters.volatility,
            var
        );

        Ok(RiskFigure {
            currency_pair: pair,
            exposure_currency: currency.clone(),
            exposure,
            leg,
            value_at_risk: var,
            expected_shortfall: es,
            confidence_level: self.confidence_level,
            num_paths: self.num_paths,
            horizon_days: self.horizon_days,
            as_of_date,
            drift: parameters.drift,
            volatility: parameters.volatility,
            mean_terminal_rate,
            low_confidence,
        })
    }
}

/// Why a standalone simulation produced no result.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    InsufficientData(#[from] InsufficientDataError),
}

/// Simulate `historical_series` and return its paths and unit VaR.
///
/// `num_paths` and `horizon_days` must be positive and `confidence_level`
/// must lie strictly between 0 and 1.
pub fn simulate(
    historical_series: &[f64],
    horizon_days: usize,
    num_paths: usize,
    confidence_level: f64,
    seed: u64,
) -> Result<SimulationOutcome, SimulationError> {
    let config = PipelineConfig {
        horizon_days,
        num_paths,
        confidence_level,
        random_seed: seed,
        ..Default::default()
    };
    config.validate()?;
    let outcome = MonteCarloEngine::from_config(&config).simulate(historical_series, "series")?;
    Ok(outcome)
}
