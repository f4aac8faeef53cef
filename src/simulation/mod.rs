//! Monte Carlo FX risk: GBM calibration, seeded path generation and
//! VaR / expected shortfall over net open positions.

pub mod gbm;
pub mod risk;
pub mod seed;
pub mod var;

pub use gbm::{GbmParameters, InsufficientDataError};
pub use risk::{
    simulate, MonteCarloEngine, RiskAssessment, RiskFigure, SimulationError, SimulationOutcome,
};
pub use var::{expected_shortfall, loss_distribution, value_at_risk, ExposureLeg};
