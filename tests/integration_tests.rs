use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use ledger_recon::core::config::PipelineConfig;
use ledger_recon::core::currency::{CurrencyCode, CurrencyPair, FxRateTable, RawRate};
use ledger_recon::core::record::RawRecord;
use ledger_recon::enrichment::{enrich, FxImpactReport};
use ledger_recon::pipeline::Pipeline;
use ledger_recon::reconciliation::matcher::reconcile;
use ledger_recon::reconciliation::outcome::Classification;
use ledger_recon::simulation::risk::simulate;
use rand::Rng;
use rand_distr::Normal;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn raw(reference: Option<&str>, date: &str, currency: &str, amount: &str) -> RawRecord {
    RawRecord {
        source_id: "feed".to_string(),
        reference_key: reference.map(str::to_string),
        date: date.to_string(),
        currency_code: currency.to_string(),
        amount: amount.to_string(),
        description: String::new(),
    }
}

/// EUR/USD closes whose daily log-returns are drawn from N(0, 0.01).
fn eur_usd_history(days: usize) -> Vec<(NaiveDate, f64)> {
    let mut rng = ledger_recon::simulation::seed::task_rng(2024, 0);
    let normal = Normal::new(0.0, 0.01).unwrap();
    let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
    let mut rate = 1.08;
    (0..days)
        .map(|i| {
            rate *= f64::exp(rng.sample(normal));
            (start + Duration::days(i as i64), rate)
        })
        .collect()
}

fn rate_rows(history: &[(NaiveDate, f64)]) -> Vec<RawRate> {
    history
        .iter()
        .map(|(date, rate)| RawRate {
            pair: "EUR/USD".to_string(),
            date: date.to_string(),
            rate: format!("{:.6}", rate),
        })
        .collect()
}

/// Amount within tolerance on the same reference: a match carrying the spread.
#[test]
fn scenario_match_with_hidden_cost() {
    let ledger = vec![raw(Some("A1"), "2024-01-05", "EUR", "1000.00")];
    let bank = vec![raw(Some("A1"), "2024-01-05", "EUR", "999.50")];

    let result = reconcile(&ledger, &bank, dec!(1.00), 0).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.outcomes()[0].classification(), Classification::Match);

    let table = enrich(result.into_outcomes(), &FxRateTable::new(CurrencyCode::new("EUR")));
    assert_eq!(table.rows()[0].hidden_cost(), Some(dec!(0.50)));
    assert_eq!(FxImpactReport::from_table(&table).total_hidden_cost, dec!(0.50));
}

#[test]
fn scenario_missing_bank() {
    let ledger = vec![raw(Some("B2"), "2024-02-01", "USD", "500")];
    let result = reconcile(&ledger, &[], dec!(0.01), 0).unwrap();

    assert_eq!(result.len(), 1);
    let outcome = &result.outcomes()[0];
    assert_eq!(outcome.classification(), Classification::MissingBank);
    assert_eq!(outcome.ledger().map(|r| r.amount()), Some(dec!(500)));
    assert!(outcome.bank().is_none());
}

#[test]
fn scenario_var_reproducible() {
    let series: Vec<f64> = eur_usd_history(250).into_iter().map(|(_, r)| r).collect();
    let first = simulate(&series, 30, 1000, 0.95, 7).unwrap();
    let second = simulate(&series, 30, 1000, 0.95, 7).unwrap();

    assert!(first.value_at_risk.is_finite());
    assert!(first.value_at_risk > 0.0);
    assert_eq!(first.value_at_risk, second.value_at_risk);
    assert_relative_eq!(first.parameters.volatility, 0.01, epsilon = 0.002);
}

#[test]
fn rejected_records_are_reported_not_matched() {
    let ledger = vec![
        raw(Some("A1"), "2024-01-05", "EUR", "10"),
        raw(Some("A2"), "2024-13-45", "EUR", "10"),
        raw(Some("A3"), "2024-01-05", "EUR", "NaN"),
    ];
    let bank = vec![raw(Some("A1"), "2024-01-05", "EURO", "10")];

    let result = reconcile(&ledger, &bank, dec!(0.01), 0).unwrap();
    assert_eq!(result.rejected().len(), 3);
    assert_eq!(result.len(), 1);
    assert_eq!(result.outcomes()[0].classification(), Classification::MissingBank);
    assert!(result.verify_completeness(ledger.len(), bank.len()));
}

/// Full pipeline: two feeds across EUR and USD, one year of rates.
#[test]
fn full_pipeline_month_end() {
    let history = eur_usd_history(365);
    let last_date = history.last().map(|(d, _)| *d).unwrap();
    let day = last_date.to_string();
    let earlier = (last_date - Duration::days(3)).to_string();

    let mut ledger = vec![
        raw(Some("INV-1"), &day, "EUR", "1200.00"),
        raw(Some("INV-2"), &day, "USD", "5400.00"),
        raw(Some("INV-3"), &earlier, "USD", "880.00"),
        raw(None, &day, "EUR", "75.25"),
        raw(Some("INV-5"), &day, "EUR", "310.00"),
    ];
    let mut bank = vec![
        raw(Some("INV-1"), &day, "EUR", "1200.00"),
        raw(Some("INV-2"), &day, "USD", "5350.00"),
        raw(Some("INV-3"), &day, "USD", "880.00"),
        raw(None, &day, "EUR", "75.25"),
        raw(Some("FEE-9"), &day, "EUR", "12.00"),
    ];
    for i in 0..40 {
        let reference = format!("BULK-{}", i);
        let amount = format!("{}.00", 100 + i);
        ledger.push(raw(Some(&reference), &day, "EUR", &amount));
        bank.push(raw(Some(&reference), &day, "EUR", &amount));
    }

    let config = PipelineConfig {
        amount_tolerance: dec!(1.00),
        date_tolerance_days: 1,
        num_paths: 500,
        worker_threads: 4,
        ..Default::default()
    };
    let pipeline = Pipeline::new(config).unwrap();
    let (rates, rate_issues) = pipeline.load_rates(&rate_rows(&history));
    assert!(rate_issues.is_empty());

    let report = pipeline.run(&ledger, &bank, &rates);
    let again = pipeline.run(&ledger, &bank, &rates);
    assert_eq!(report, again);

    let summary = &report.summary;
    assert_eq!(summary.record_coverage, ledger.len() + bank.len());
    assert_eq!(summary.count(Classification::Match), 42);
    // INV-2 is off by 50 USD, INV-3 by three days.
    assert_eq!(summary.count(Classification::Mismatch), 2);
    assert_eq!(summary.count(Classification::MissingBank), 1);
    assert_eq!(summary.count(Classification::MissingLedger), 1);
    assert_eq!(report.rows.len(), 46);

    // The USD leg is open and has a year of history.
    assert_eq!(report.risk.len(), 1);
    let risk = &report.risk[0];
    assert_eq!(
        risk.currency_pair,
        CurrencyPair::new(CurrencyCode::new("EUR"), CurrencyCode::new("USD"))
    );
    assert_eq!(risk.as_of_date, last_date);
    assert_eq!(risk.num_paths, 500);
    assert_eq!(risk.horizon_days, 30);
    assert!(risk.value_at_risk > 0.0);

    let inv2 = report
        .rows
        .iter()
        .find(|r| r.ledger_reference.as_deref() == Some("INV-2"))
        .unwrap();
    let hidden = inv2.hidden_cost.unwrap();
    assert!(hidden > Decimal::ZERO);
    for row in &report.rows {
        assert!(row.anomaly_score > 0.0 && row.anomaly_score <= 1.0);
    }

    assert!(report.issues.is_empty());
    let json = report.to_json().unwrap();
    assert!(json.contains("\"MISSING_LEDGER\""));
    assert!(report.to_string().contains("=== FX Risk ==="));
}

#[test]
fn invalid_config_fails_before_work() {
    let err = PipelineConfig::from_json_str(r#"{ "num_paths": 0 }"#).unwrap_err();
    assert!(err.to_string().contains("num_paths"));

    let config = PipelineConfig::from_json_str(r#"{ "base_currency": "USD", "var_basis": "path_minimum" }"#)
        .unwrap();
    assert_eq!(config.base_currency, CurrencyCode::new("USD"));
    assert_eq!(config.num_trees, 100);
}

/// Amounts at the edge of the Decimal range degrade one outcome, not the batch.
#[test]
fn extreme_amounts_do_not_abort_the_run() {
    let ledger = vec![
        raw(Some("BIG"), "2024-01-05", "EUR", "50000000000000000000000000000"),
        raw(Some("A1"), "2024-01-05", "EUR", "1000.00"),
        raw(Some("MAX-1"), "2024-01-05", "EUR", "70000000000000000000000000000"),
        raw(Some("MAX-2"), "2024-01-06", "EUR", "70000000000000000000000000000"),
    ];
    let bank = vec![
        raw(Some("BIG"), "2024-01-05", "EUR", "-50000000000000000000000000000"),
        raw(Some("A1"), "2024-01-05", "EUR", "999.50"),
    ];

    let pipeline = Pipeline::new(PipelineConfig {
        amount_tolerance: dec!(1.00),
        num_paths: 100,
        ..Default::default()
    })
    .unwrap();
    let report = pipeline.run(&ledger, &bank, &FxRateTable::new(CurrencyCode::new("EUR")));

    assert_eq!(report.rows.len(), 4);
    assert_eq!(report.summary.count(Classification::Match), 1);
    assert_eq!(report.summary.count(Classification::Mismatch), 1);
    assert_eq!(report.summary.count(Classification::MissingBank), 2);

    let big = report
        .rows
        .iter()
        .find(|r| r.ledger_reference.as_deref() == Some("BIG"))
        .unwrap();
    assert_eq!(big.hidden_cost, None);
    assert_eq!(report.fx_impact.total_volume, Decimal::MAX);
    for row in &report.rows {
        assert!(row.anomaly_score > 0.0 && row.anomaly_score <= 1.0);
    }
}
