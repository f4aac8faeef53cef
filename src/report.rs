//! In-process report handed to the report assembler: one row per outcome,
//! a risk summary table, and every non-fatal issue raised on the way.

use crate::anomaly::forest::AnomalyScore;
use crate::core::currency::{CurrencyCode, CurrencyPair};
use crate::core::error::PipelineIssue;
use crate::enrichment::fx::EnrichedRow;
use crate::enrichment::impact::FxImpactReport;
use crate::reconciliation::outcome::{Classification, MismatchReason, ReconciliationSummary};
use crate::simulation::risk::RiskFigure;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One classified outcome, flattened for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch_reason: Option<MismatchReason>,
    pub ledger_reference: Option<String>,
    pub bank_reference: Option<String>,
    pub ledger_amount: Option<Decimal>,
    pub bank_amount: Option<Decimal>,
    pub converted_amount_base: Option<Decimal>,
    pub hidden_cost: Option<Decimal>,
    pub currency: CurrencyCode,
    pub anomaly_score: f64,
    pub anomaly_flag: bool,
}

impl ReportRow {
    pub fn new(row: &EnrichedRow, score: AnomalyScore) -> Self {
        let outcome = &row.outcome;
        Self {
            classification: outcome.classification(),
            mismatch_reason: outcome.mismatch_reason(),
            ledger_reference: outcome.ledger().and_then(|r| r.reference()).map(str::to_string),
            bank_reference: outcome.bank().and_then(|r| r.reference()).map(str::to_string),
            ledger_amount: outcome.ledger().map(|r| r.amount()),
            bank_amount: outcome.bank().map(|r| r.amount()),
            converted_amount_base: row.converted_amount_base(),
            hidden_cost: row.hidden_cost(),
            currency: row.currency().clone(),
            anomaly_score: score.score,
            anomaly_flag: score.is_anomaly,
        }
    }
}

/// One line of the risk summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummaryRow {
    pub currency_pair: CurrencyPair,
    pub value_at_risk: f64,
    pub confidence_level: f64,
    pub num_paths: usize,
    pub horizon_days: usize,
    pub as_of_date: NaiveDate,
}

impl From<&RiskFigure> for RiskSummaryRow {
    fn from(figure: &RiskFigure) -> Self {
        Self {
            currency_pair: figure.currency_pair.clone(),
            value_at_risk: figure.value_at_risk,
            confidence_level: figure.confidence_level,
            num_paths: figure.num_paths,
            horizon_days: figure.horizon_days,
            as_of_date: figure.as_of_date,
        }
    }
}

/// Everything a pipeline run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub summary: ReconciliationSummary,
    pub rows: Vec<ReportRow>,
    pub risk: Vec<RiskSummaryRow>,
    /// Full per-pair figures behind the summary table.
    pub risk_figures: Vec<RiskFigure>,
    pub fx_impact: FxImpactReport,
    pub issues: Vec<PipelineIssue>,
}

impl PipelineReport {
    pub fn anomalies(&self) -> impl Iterator<Item = &ReportRow> {
        self.rows.iter().filter(|r| r.anomaly_flag)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn cell(value: &Option<Decimal>) -> String {
    value.map(|v| v.round_dp(2).to_string()).unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for ReportRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<15} {:<12} {:<12} {:>14} {:>14} {:>14} {:>10} {} {:.3}{}",
            self.classification.as_str(),
            self.ledger_reference.as_deref().unwrap_or("-"),
            self.bank_reference.as_deref().unwrap_or("-"),
            cell(&self.ledger_amount),
            cell(&self.bank_amount),
            cell(&self.converted_amount_base),
            cell(&self.hidden_cost),
            self.currency,
            self.anomaly_score,
            if self.anomaly_flag { " *" } else { "" }
        )
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)?;
        writeln!(f)?;
        write!(f, "{}", self.fx_impact)?;

        if !self.risk.is_empty() {
            writeln!(f)?;
            writeln!(f, "=== FX Risk ===")?;
            for row in &self.risk {
                writeln!(
                    f,
                    "{:<8} VaR {:.0}%: {:>14.2}  ({} paths, {} days from {})",
                    row.currency_pair.to_string(),
                    row.confidence_level * 100.0,
                    row.value_at_risk,
                    row.num_paths,
                    row.horizon_days,
                    row.as_of_date
                )?;
            }
        }

        let anomalies: Vec<&ReportRow> = self.anomalies().collect();
        if !anomalies.is_empty() {
            writeln!(f)?;
            writeln!(f, "=== Anomalies ({}) ===", anomalies.len())?;
            for row in anomalies {
                writeln!(f, "{}", row)?;
            }
        }

        if !self.issues.is_empty() {
            writeln!(f)?;
            writeln!(f, "=== Issues ({}) ===", self.issues.len())?;
            for issue in &self.issues {
                writeln!(f, "[{}] {}", issue.kind(), issue)?;
            }
        }
        Ok(())
    }
}
