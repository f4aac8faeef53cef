//! ledger-recon CLI
//!
//! Reconcile a ledger export against a bank feed from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Full run: reconciliation, FX enrichment, risk and anomaly scoring
//! ledger-recon run --ledger ledger.json --bank bank.json --rates rates.json
//!
//! # Reconciliation only, as JSON
//! ledger-recon reconcile --ledger ledger.json --bank bank.json --format json
//!
//! # Simulate one currency pair from its rate history
//! ledger-recon simulate --rates rates.json --pair EUR/USD
//! ```

use ledger_recon::core::config::PipelineConfig;
use ledger_recon::core::currency::{CurrencyPair, FxRateTable, RawRate};
use ledger_recon::core::record::{RawRecord, TransactionRecord};
use ledger_recon::pipeline::Pipeline;
use ledger_recon::reconciliation::matcher::Reconciler;
use ledger_recon::simulation::risk::MonteCarloEngine;
use serde::de::DeserializeOwned;
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"ledger-recon — ledger/bank reconciliation with FX risk and anomaly scoring

USAGE:
    ledger-recon <COMMAND> [OPTIONS]

COMMANDS:
    run         Reconcile, enrich, simulate FX risk and score anomalies
    reconcile   Classify ledger and bank records only
    simulate    Run the Monte Carlo VaR model on one pair's rate history
    help        Show this message

OPTIONS:
    --ledger <FILE>     JSON ledger records (run, reconcile)
    --bank <FILE>       JSON bank records (run, reconcile)
    --rates <FILE>      JSON rate history (run, simulate)
    --pair <PAIR>       Currency pair to simulate, e.g. EUR/USD (simulate)
    --config <FILE>     JSON configuration; omitted options keep defaults
    --format <FORMAT>   Output format: text (default) or json

Set RUST_LOG=debug for per-pair and per-key detail.

EXAMPLES:
    ledger-recon run --ledger ledger.json --bank bank.json --rates rates.json
    ledger-recon reconcile --ledger ledger.json --bank bank.json --format json
    ledger-recon simulate --rates rates.json --pair EUR/USD --config month_end.json"#
    );
}

/// JSON schema for a record feed.
#[derive(serde::Deserialize)]
struct RecordsFile {
    records: Vec<RawRecord>,
}

/// JSON schema for the rate history.
#[derive(serde::Deserialize)]
struct RatesFile {
    rates: Vec<RawRate>,
}

#[derive(serde::Serialize)]
struct SimulationOutput {
    currency_pair: String,
    observations: usize,
    spot: f64,
    drift: f64,
    volatility: f64,
    num_paths: usize,
    horizon_days: usize,
    confidence_level: f64,
    value_at_risk: f64,
    mean_terminal_rate: f64,
    low_confidence: bool,
}

#[derive(Default)]
struct Options {
    ledger: Option<String>,
    bank: Option<String>,
    rates: Option<String>,
    pair: Option<String>,
    config: Option<String>,
    format: String,
}

impl Options {
    fn parse(args: &[String]) -> Self {
        let mut options = Options {
            format: "text".to_string(),
            ..Default::default()
        };
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            i += 1;
            let value = args.get(i).cloned().unwrap_or_else(|| {
                eprintln!("{} requires a value", flag);
                process::exit(1);
            });
            match flag {
                "--ledger" => options.ledger = Some(value),
                "--bank" => options.bank = Some(value),
                "--rates" => options.rates = Some(value),
                "--pair" => options.pair = Some(value),
                "--config" => options.config = Some(value),
                "--format" => {
                    if value != "text" && value != "json" {
                        eprintln!("--format requires 'text' or 'json'");
                        process::exit(1);
                    }
                    options.format = value;
                }
                _ => {
                    eprintln!("Unknown option: {}", flag);
                    process::exit(1);
                }
            }
            i += 1;
        }
        options
    }

    fn json(&self) -> bool {
        self.format == "json"
    }
}

fn require(value: &Option<String>, flag: &str) -> String {
    value.clone().unwrap_or_else(|| {
        eprintln!("Error: {} <FILE> is required", flag);
        process::exit(1);
    })
}

fn load_json<T: DeserializeOwned>(path: &str, expected: &str) -> T {
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    });
    serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing '{}': {}", path, e);
        eprintln!("Expected format:");
        eprintln!("{}", expected);
        process::exit(1);
    })
}

fn load_records(path: &str) -> Vec<RawRecord> {
    let file: RecordsFile = load_json(
        path,
        r#"{
  "records": [
    { "source_id": "ERP", "reference_key": "A1", "date": "2024-01-05",
      "currency_code": "EUR", "amount": "1000.00", "description": "invoice 4711" }
  ]
}"#,
    );
    file.records
}

fn load_rates(path: &str) -> Vec<RawRate> {
    let file: RatesFile = load_json(
        path,
        r#"{
  "rates": [
    { "pair": "EUR/USD", "date": "2024-01-05", "rate": "1.0921" }
  ]
}"#,
    );
    file.rates
}

fn load_config(options: &Options) -> PipelineConfig {
    let result = match &options.config {
        Some(path) => PipelineConfig::from_json_file(path),
        None => {
            let config = PipelineConfig::default();
            config.validate().map(|_| config)
        }
    };
    result.unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        process::exit(2);
    })
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serialising output: {}", e);
            process::exit(1);
        }
    }
}

fn cmd_run(args: &[String]) {
    let options = Options::parse(args);
    let ledger = load_records(&require(&options.ledger, "--ledger"));
    let bank = load_records(&require(&options.bank, "--bank"));
    let rate_rows = load_rates(&require(&options.rates, "--rates"));

    let pipeline = Pipeline::new(load_config(&options)).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        process::exit(2);
    });
    let (rates, mut issues) = pipeline.load_rates(&rate_rows);
    let mut report = pipeline.run(&ledger, &bank, &rates);
    issues.append(&mut report.issues);
    report.issues = issues;

    if options.json() {
        print_json(&report);
    } else {
        print!("{}", report);
    }
}

fn cmd_reconcile(args: &[String]) {
    let options = Options::parse(args);
    let ledger = load_records(&require(&options.ledger, "--ledger"));
    let bank = load_records(&require(&options.bank, "--bank"));
    let config = load_config(&options);

    let result = Reconciler::from_config(&config).reconcile(&ledger, &bank);

    if options.json() {
        print_json(&result);
        return;
    }

    print!("{}", result.summary());
    println!();
    for outcome in result.outcomes() {
        let reference = |r: Option<&TransactionRecord>| {
            r.and_then(|r| r.reference()).unwrap_or("-").to_string()
        };
        let amount = |r: Option<&TransactionRecord>| {
            r.map(|r| r.amount().to_string()).unwrap_or_else(|| "-".to_string())
        };
        println!(
            "{:<15} {:<12} {:<12} {:>14} {:>14} {}",
            outcome.classification().as_str(),
            reference(outcome.ledger()),
            reference(outcome.bank()),
            amount(outcome.ledger()),
            amount(outcome.bank()),
            outcome.currency()
        );
    }
    for rejected in result.rejected() {
        println!("rejected: {}", rejected);
    }
}

fn cmd_simulate(args: &[String]) {
    let options = Options::parse(args);
    let rate_rows = load_rates(&require(&options.rates, "--rates"));
    let pair: CurrencyPair = require(&options.pair, "--pair").parse().unwrap_or_else(|e| {
        eprintln!("{}", e);
        process::exit(1);
    });
    let config = load_config(&options);

    let (rates, errors) = FxRateTable::from_raw(config.base_currency.clone(), &rate_rows);
    for err in &errors {
        eprintln!("skipped rate row: {}", err);
    }
    let series: Vec<f64> = rates.history(&pair).into_iter().map(|(_, rate)| rate).collect();

    let engine = MonteCarloEngine::from_config(&config);
    let outcome = engine.simulate(&series, &pair.to_string()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });
    let terminals: Vec<f64> = outcome.paths.iter().filter_map(|p| p.last().copied()).collect();
    let mean_terminal_rate = if terminals.is_empty() {
        outcome.parameters.spot
    } else {
        terminals.iter().sum::<f64>() / terminals.len() as f64
    };

    let output = SimulationOutput {
        currency_pair: pair.to_string(),
        observations: outcome.parameters.observations,
        spot: outcome.parameters.spot,
        drift: outcome.parameters.drift,
        volatility: outcome.parameters.volatility,
        num_paths: engine.num_paths,
        horizon_days: engine.horizon_days,
        confidence_level: engine.confidence_level,
        value_at_risk: outcome.value_at_risk,
        mean_terminal_rate,
        low_confidence: outcome.low_confidence,
    };

    if options.json() {
        print_json(&output);
    } else {
        println!("=== Monte Carlo VaR: {} ===", output.currency_pair);
        println!("Observations:   {}", output.observations);
        println!("Spot:           {:.6}", output.spot);
        println!("Drift (daily):  {:.6}", output.drift);
        println!("Vol (daily):    {:.6}", output.volatility);
        println!("Paths:          {} x {} days", output.num_paths, output.horizon_days);
        println!(
            "VaR {:.0}%:        {:.4} per unit of {}",
            output.confidence_level * 100.0,
            output.value_at_risk,
            pair.base
        );
        println!("Mean terminal:  {:.6}", output.mean_terminal_rate);
        if output.low_confidence {
            println!("(low confidence: fewer than 100 paths)");
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "run" => cmd_run(rest),
        "reconcile" => cmd_reconcile(rest),
        "simulate" => cmd_simulate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
