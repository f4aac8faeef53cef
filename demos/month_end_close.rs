//! Month-end close example.
//!
//! Reconciles a small ledger export against a bank statement, converts
//! everything into EUR, simulates the open USD and GBP exposure and lists
//! the records the anomaly model finds unusual.

use chrono::{Duration, NaiveDate};
use ledger_recon::prelude::*;
use rand::Rng;
use rand_distr::Normal;

fn record(reference: Option<&str>, date: NaiveDate, currency: &str, amount: &str) -> RawRecord {
    RawRecord {
        source_id: "demo".to_string(),
        reference_key: reference.map(str::to_string),
        date: date.to_string(),
        currency_code: currency.to_string(),
        amount: amount.to_string(),
        description: String::new(),
    }
}

/// A year of daily quotes starting from `spot`, with 0.6% daily volatility.
fn history(pair: &str, spot: f64, seed: u64, end: NaiveDate) -> Vec<RawRate> {
    let mut rng = ledger_recon::simulation::seed::task_rng(seed, 0);
    let normal = Normal::new(0.0, 0.006).unwrap();
    let mut rate = spot;
    (0..365)
        .rev()
        .map(|back| {
            rate *= f64::exp(rng.sample(normal));
            RawRate {
                pair: pair.to_string(),
                date: (end - Duration::days(back)).to_string(),
                rate: format!("{:.6}", rate),
            }
        })
        .collect()
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("╔══════════════════════════════════════════╗");
    println!("║  ledger-recon: Month-End Close Example   ║");
    println!("╚══════════════════════════════════════════╝\n");

    let close = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    let day = |d: u32| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();

    let mut ledger = vec![
        record(Some("INV-1001"), day(5), "EUR", "1000.00"),
        record(Some("INV-1002"), day(8), "USD", "25000.00"),
        record(Some("INV-1003"), day(12), "GBP", "8400.00"),
        record(Some("INV-1004"), day(15), "USD", "500.00"),
        record(None, day(19), "EUR", "149.90"),
        record(Some("INV-1006"), day(22), "EUR", "not-a-number"),
    ];
    let mut bank = vec![
        record(Some("INV-1001"), day(5), "EUR", "999.50"),
        record(Some("INV-1002"), day(9), "USD", "24850.00"),
        record(Some("INV-1003"), day(12), "GBP", "8400.00"),
        record(None, day(19), "EUR", "149.90"),
        record(Some("CHG-77"), day(31), "EUR", "35.00"),
    ];
    // Routine card settlements.
    for i in 0..60u32 {
        let reference = format!("CARD-{}", i);
        let amount = format!("{}.{:02}", 20 + i % 17, i % 100);
        ledger.push(record(Some(&reference), day(1 + i % 28), "EUR", &amount));
        bank.push(record(Some(&reference), day(1 + i % 28), "EUR", &amount));
    }

    let mut rates = history("EUR/USD", 1.09, 11, close);
    rates.extend(history("GBP/EUR", 1.16, 12, close));

    let config = PipelineConfig {
        amount_tolerance: rust_decimal_macros::dec!(1.00),
        date_tolerance_days: 1,
        ..Default::default()
    };
    let pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return;
        }
    };

    let (table, mut issues) = pipeline.load_rates(&rates);
    let mut report = pipeline.run(&ledger, &bank, &table);
    issues.append(&mut report.issues);
    report.issues = issues;

    print!("{}", report);

    println!("\n━━━ Open positions ━━━\n");
    for figure in &report.risk_figures {
        println!(
            "{:<4} {:>14.2} EUR via {}  VaR {:>10.2}  ES {:>10.2}  vol {:.4}",
            figure.exposure_currency,
            figure.exposure,
            figure.currency_pair,
            figure.value_at_risk,
            figure.expected_shortfall,
            figure.volatility
        );
    }
}
