//! Loss distributions and empirical risk measures.

use crate::core::config::{PercentileMethod, VarBasis};
use serde::{Deserialize, Serialize};

/// Slack for `p * n` landing a rounding error above a whole rank.
const RANK_EPSILON: f64 = 1e-9;

/// Which leg of the simulated pair the exposure is held in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureLeg {
    /// Exposure in the pair's base currency: its value moves with `S_t / S_0`.
    Base,
    /// Exposure in the pair's quote currency: its value moves with `S_0 / S_t`.
    Quote,
}

impl ExposureLeg {
    fn value_ratio(self, spot: f64, mark: f64) -> f64 {
        match self {
            ExposureLeg::Base => mark / spot,
            ExposureLeg::Quote => spot / mark,
        }
    }
}

/// Loss of `exposure` on every path, positive meaning money lost.
///
/// Each path starts at the spot. With [`VarBasis::Terminal`] the loss is
/// read at the horizon; with [`VarBasis::PathMinimum`] it is the worst
/// loss reached at any step.
pub fn loss_distribution(
    paths: &[Vec<f64>],
    exposure: f64,
    leg: ExposureLeg,
    basis: VarBasis,
) -> Vec<f64> {
    paths
        .iter()
        .filter_map(|path| {
            let spot = *path.first()?;
            let loss_at = |mark: f64| exposure * (1.0 - leg.value_ratio(spot, mark));
            match basis {
                VarBasis::Terminal => path.last().map(|mark| loss_at(*mark)),
                VarBasis::PathMinimum => path.iter().map(|mark| loss_at(*mark)).reduce(f64::max),
            }
        })
        .collect()
}

/// Empirical `p`-quantile of an ascending sample. Empty samples give 0.
pub fn percentile(sorted: &[f64], p: f64, method: PercentileMethod) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let p = p.clamp(0.0, 1.0);
    match method {
        PercentileMethod::NearestRank => {
            let rank = (p * n as f64 - RANK_EPSILON).ceil() as usize;
            sorted[rank.clamp(1, n) - 1]
        }
        PercentileMethod::Interpolated => {
            let h = (n - 1) as f64 * p;
            let lo = h.floor() as usize;
            let hi = h.ceil() as usize;
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

fn sorted(losses: &[f64]) -> Vec<f64> {
    let mut sorted = losses.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Loss not exceeded with probability `confidence`.
///
/// At 95 % this is the 95th percentile of losses, i.e. the 5th percentile
/// of profit and loss.
pub fn value_at_risk(losses: &[f64], confidence: f64, method: PercentileMethod) -> f64 {
    percentile(&sorted(losses), confidence, method)
}

/// Mean loss over the tail at or beyond the VaR.
pub fn expected_shortfall(losses: &[f64], confidence: f64, method: PercentileMethod) -> f64 {
    let sorted = sorted(losses);
    let var = percentile(&sorted, confidence, method);
    let tail: Vec<f64> = sorted.iter().copied().filter(|l| *l >= var).collect();
    if tail.is_empty() {
        return var;
    }
    tail.iter().sum::<f64>() / tail.len() as f64
}
