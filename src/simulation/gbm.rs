//! Geometric Brownian Motion over daily steps.

use crate::core::parallel::par_map;
use crate::simulation::seed::task_rng;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Too few usable observations to estimate volatility.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("need at least 2 positive observations to estimate {series}, got {observations}")]
pub struct InsufficientDataError {
    /// Label of the series, usually the currency pair.
    pub series: String,
    pub observations: usize,
}

/// Drift and volatility of daily log-returns, anchored at the last price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GbmParameters {
    /// Mean daily log-return.
    pub drift: f64,
    /// Standard deviation of daily log-returns.
    pub volatility: f64,
    /// Starting point of every simulated path.
    pub spot: f64,
    pub observations: usize,
}

impl GbmParameters {
    /// Estimate parameters from a price series in ascending date order.
    ///
    /// Non-positive and non-finite prices are skipped. Volatility uses the
    /// population standard deviation, so two observations give σ = 0.
    pub fn estimate(series: &[f64], label: &str) -> Result<Self, InsufficientDataError> {
        let prices: Vec<f64> = series
            .iter()
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
            .collect();
        if prices.len() < 2 {
            return Err(InsufficientDataError {
                series: label.to_string(),
                observations: prices.len(),
            });
        }

        let returns: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let n = returns.len() as f64;
        let drift = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - drift).powi(2)).sum::<f64>() / n;

        Ok(Self {
            drift,
            volatility: variance.sqrt(),
            // Length checked above.
            spot: prices[prices.len() - 1],
            observations: prices.len(),
        })
    }

    /// Build parameters directly, e.g. for scenario analysis.
    pub fn new(drift: f64, volatility: f64, spot: f64) -> Self {
        Self {
            drift,
            volatility,
            spot,
            observations: 0,
        }
    }

    /// One path of `horizon_days + 1` points starting at `spot`.
    ///
    /// `S[t+1] = S[t] * exp((μ - σ²/2)·dt + σ·√dt·Z)` with `dt = 1`.
    pub fn path<R: Rng + ?Sized>(&self, horizon_days: usize, rng: &mut R) -> Vec<f64> {
        let dt = 1.0_f64;
        let step_drift = (self.drift - 0.5 * self.volatility * self.volatility) * dt;
        let step_vol = self.volatility * dt.sqrt();

        let mut path = Vec::with_capacity(horizon_days + 1);
        let mut price = self.spot;
        path.push(price);
        for _ in 0..horizon_days {
            let z: f64 = rng.sample(StandardNormal);
            price *= (step_drift + step_vol * z).exp();
            path.push(price);
        }
        path
    }

    /// `num_paths` independent paths; path `i` draws from stream `i` of `seed`.
    pub fn paths(
        &self,
        horizon_days: usize,
        num_paths: usize,
        seed: u64,
        workers: usize,
    ) -> Vec<Vec<f64>> {
        par_map(workers, num_paths, |i| {
            let mut rng = task_rng(seed, i as u64);
            self.path(horizon_days, &mut rng)
        })
    }
}
