//! End-to-end run: reconcile, enrich, then score risk and anomalies side by
//! side over the same enriched table.

use crate::anomaly::detector::AnomalyEngine;
use crate::anomaly::forest::AnomalyScore;
use crate::core::config::{ConfigurationError, PipelineConfig};
use crate::core::currency::{FxRateTable, RawRate};
use crate::core::error::PipelineIssue;
use crate::core::record::RawRecord;
use crate::enrichment::fx::enrich;
use crate::enrichment::impact::FxImpactReport;
use crate::reconciliation::matcher::Reconciler;
use crate::report::{PipelineReport, ReportRow, RiskSummaryRow};
use crate::simulation::risk::{MonteCarloEngine, RiskAssessment};

/// A validated configuration bound to the three engines.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Fails fast on any out-of-range option; no work has started yet.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load raw rate rows into a table on the configured base currency.
    pub fn load_rates(&self, rows: &[RawRate]) -> (FxRateTable, Vec<PipelineIssue>) {
        let (table, errors) = FxRateTable::from_raw(self.config.base_currency.clone(), rows);
        (table, errors.into_iter().map(PipelineIssue::from).collect())
    }

    /// Run every stage over the two feeds.
    ///
    /// Record-level problems never abort the run; they end up in
    /// [`PipelineReport::issues`] in the order they were raised.
    pub fn run(&self, ledger: &[RawRecord], bank: &[RawRecord], rates: &FxRateTable) -> PipelineReport {
        let mut issues = Vec::new();
        if rates.base_currency != self.config.base_currency {
            log::warn!(
                "rate table is based on {}, configured base is {}; using the table's",
                rates.base_currency,
                self.config.base_currency
            );
        }

        let reconciled = Reconciler::from_config(&self.config).reconcile(ledger, bank);
        let summary = reconciled.summary();
        issues.extend(reconciled.rejected().iter().cloned().map(PipelineIssue::from));

        let table = enrich(reconciled.into_outcomes(), rates);
        issues.extend(table.missing_rates().iter().cloned().map(PipelineIssue::from));
        issues.extend(
            table
                .overflowed_conversions()
                .iter()
                .cloned()
                .map(PipelineIssue::from),
        );
        let fx_impact = FxImpactReport::from_table(&table);

        let risk_engine = MonteCarloEngine::from_config(&self.config);
        let anomaly_engine = AnomalyEngine::from_config(&self.config);
        let (assessment, scores) = run_branches(
            || risk_engine.assess(table.positions(), rates),
            || anomaly_engine.detect(&table),
        );
        issues.extend(assessment.skipped.iter().cloned().map(PipelineIssue::from));

        let rows: Vec<ReportRow> = table
            .rows()
            .iter()
            .zip(scores)
            .map(|(row, score)| ReportRow::new(row, score))
            .collect();
        let risk = assessment.figures.iter().map(RiskSummaryRow::from).collect();

        log::info!(
            "pipeline finished: {} rows, {} risk figures, {} issues",
            rows.len(),
            assessment.figures.len(),
            issues.len()
        );

        PipelineReport {
            summary,
            rows,
            risk,
            risk_figures: assessment.figures,
            fx_impact,
            issues,
        }
    }
}

/// The risk and anomaly branches only read the enriched table, so they run
/// on two scoped threads.
fn run_branches<R, A>(risk: R, anomaly: A) -> (RiskAssessment, Vec<AnomalyScore>)
where
    R: FnOnce() -> RiskAssessment + Send,
    A: FnOnce() -> Vec<AnomalyScore> + Send,
{
    let joined = crossbeam::thread::scope(|scope| {
        let risk = scope.spawn(move |_| risk());
        let scores = anomaly();
        match risk.join() {
            Ok(assessment) => (assessment, scores),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    });
    match joined {
        Ok(out) => out,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::outcome::Classification;

    fn raw(reference: Option<&str>, date: &str, currency: &str, amount: &str) -> RawRecord {
        RawRecord {
            source_id: "test".to_string(),
            reference_key: reference.map(str::to_string),
            date: date.to_string(),
            currency_code: currency.to_string(),
            amount: amount.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = PipelineConfig {
            confidence_level: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(ConfigurationError::ConfidenceOutOfRange(_))
        ));
    }

    #[test]
    fn test_run_collects_issues() {
        let pipeline = Pipeline::new(PipelineConfig {
            num_paths: 200,
            worker_threads: 2,
            ..Default::default()
        })
        .unwrap();
        let (rates, rate_issues) = pipeline.load_rates(&[
            RawRate {
                pair: "EUR/USD".to_string(),
                date: "2024-01-01".to_string(),
                rate: "1.10".to_string(),
            },
            RawRate {
                pair: "EUR/USD".to_string(),
                date: "not a date".to_string(),
                rate: "1.10".to_string(),
            },
        ]);
        assert_eq!(rate_issues.len(), 1);
        assert_eq!(rate_issues[0].kind(), "InvalidRate");

        let ledger = vec![
            raw(Some("A1"), "2024-01-05", "EUR", "1000.00"),
            raw(Some("B2"), "2024-02-01", "USD", "500"),
            raw(Some("C3"), "2024-02-01", "JPY", "9000"),
            raw(Some("D4"), "yesterday", "EUR", "1"),
        ];
        let bank = vec![raw(Some("A1"), "2024-01-05", "EUR", "999.99")];

        let report = pipeline.run(&ledger, &bank, &rates);

        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.summary.count(Classification::Match), 1);
        assert_eq!(report.summary.count(Classification::MissingBank), 2);

        let kinds: Vec<&str> = report.issues.iter().map(|i| i.kind()).collect();
        assert!(kinds.contains(&"RecordValidationError"));
        assert!(kinds.contains(&"MissingRateError"));
        // One USD observation is not enough to estimate volatility.
        assert!(kinds.contains(&"InsufficientDataError"));
        assert!(report.risk.is_empty());

        for row in &report.rows {
            assert!(row.anomaly_score > 0.0 && row.anomaly_score <= 1.0);
        }
    }
}
