//! FX enrichment: base-currency conversion, hidden cost and net open
//! positions, plus the aggregated impact report.

pub mod fx;
pub mod impact;

pub use fx::{enrich, EnrichedRow, EnrichedTable};
pub use impact::{CurrencyImpact, FxImpactReport};
