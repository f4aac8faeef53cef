use crate::anomaly::features::FeatureTable;
use crate::anomaly::forest::{AnomalyScore, ForestParams, IsolationForest};
use crate::core::config::PipelineConfig;
use crate::enrichment::fx::EnrichedTable;

/// Scores every row of an enriched table against a forest fitted on that
/// same table.
#[derive(Debug, Clone)]
pub struct AnomalyEngine {
    params: ForestParams,
}

impl AnomalyEngine {
    pub fn new(params: ForestParams) -> Self {
        Self { params }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(ForestParams::from_config(config))
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// One score per row, in row order.
    pub fn detect(&self, table: &EnrichedTable) -> Vec<AnomalyScore> {
        if table.is_empty() {
            return Vec::new();
        }
        let features = FeatureTable::from_enriched(table);
        let forest = IsolationForest::fit(&features.rows, &self.params);
        let scores = forest.score_all(&features.rows);

        let flagged = scores.iter().filter(|s| s.is_anomaly).count();
        log::info!(
            "scored {} rows with {} trees (sample size {}), {} flagged above {}",
            scores.len(),
            forest.tree_count(),
            forest.sample_size(),
            flagged,
            self.params.threshold
        );
        scores
    }
}
