//! # ledger-recon
//!
//! Batch reconciliation of an internal ledger against a bank feed, with FX
//! exposure analysis and anomaly scoring.
//!
//! Two record sets are joined on a match key and every record lands in
//! exactly one classified outcome. Outcomes are converted into a base
//! currency, the resulting net open positions are stress-tested with
//! seeded Monte Carlo simulation, and every outcome is scored by an
//! isolation forest.
//!
//! ## Architecture
//!
//! - **core**: Records, currencies and rate tables, positions, configuration, issues
//! - **reconciliation**: Two-sided hash join and outcome classification
//! - **enrichment**: Base-currency conversion, hidden cost, FX impact
//! - **simulation**: GBM paths, VaR and expected shortfall per currency pair
//! - **anomaly**: Isolation forest over per-outcome features
//! - **pipeline**: Runs the stages and assembles the report

pub mod anomaly;
pub mod core;
pub mod enrichment;
pub mod pipeline;
pub mod reconciliation;
pub mod report;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::anomaly::{fit_and_score, AnomalyEngine, AnomalyScore};
    pub use crate::core::config::PipelineConfig;
    pub use crate::core::currency::{CurrencyCode, CurrencyPair, FxRateTable, RawRate};
    pub use crate::core::error::PipelineIssue;
    pub use crate::core::record::{RawRecord, SourceSystem, TransactionRecord};
    pub use crate::enrichment::{enrich, FxImpactReport};
    pub use crate::pipeline::Pipeline;
    pub use crate::reconciliation::{reconcile, Classification, Reconciler};
    pub use crate::report::{PipelineReport, ReportRow, RiskSummaryRow};
    pub use crate::simulation::{simulate, MonteCarloEngine};
}
