use chrono::{Duration, NaiveDate};
use ledger_recon::anomaly::forest::fit_and_score;
use ledger_recon::core::currency::CurrencyCode;
use ledger_recon::core::record::{SourceSystem, TransactionRecord};
use ledger_recon::reconciliation::matcher::{MatchTolerance, Reconciler};
use ledger_recon::reconciliation::outcome::{Classification, ReconciliationResult};
use ledger_recon::simulation::risk::simulate;
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Reference keys from a small pool so keys collide on both sides.
fn arb_reference() -> impl Strategy<Value = Option<String>> {
    prop::option::weighted(
        0.8,
        prop::sample::select(vec!["A", "B", "C", "D", "E", "F", "G", "H"]).prop_map(String::from),
    )
}

fn arb_currency() -> impl Strategy<Value = CurrencyCode> {
    prop::sample::select(vec![
        CurrencyCode::new("EUR"),
        CurrencyCode::new("USD"),
        CurrencyCode::new("GBP"),
    ])
}

/// Amounts in cents, 0.01 to 10,000.00.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_record() -> impl Strategy<Value = (Option<String>, i64, CurrencyCode, Decimal)> {
    (arb_reference(), 0i64..10, arb_currency(), arb_amount())
}

fn build(source: SourceSystem, raw: Vec<(Option<String>, i64, CurrencyCode, Decimal)>) -> Vec<TransactionRecord> {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    raw.into_iter()
        .enumerate()
        .map(|(i, (reference, offset, currency, amount))| {
            let record =
                TransactionRecord::new(source, i, start + Duration::days(offset), currency, amount);
            match reference {
                Some(r) => record.with_reference(r),
                None => record,
            }
        })
        .collect()
}

fn arb_feeds() -> impl Strategy<Value = (Vec<TransactionRecord>, Vec<TransactionRecord>)> {
    (
        prop::collection::vec(arb_record(), 0..40),
        prop::collection::vec(arb_record(), 0..40),
    )
        .prop_map(|(l, b)| (build(SourceSystem::Ledger, l), build(SourceSystem::Bank, b)))
}

fn arb_tolerance() -> impl Strategy<Value = MatchTolerance> {
    (0i64..500, 0i64..3).prop_map(|(cents, days)| MatchTolerance::new(Decimal::new(cents, 2), days))
}

/// Log-price series with small daily moves around 1.10.
fn arb_series() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.02f64..0.02, 5..60).prop_map(|returns| {
        let mut rate = 1.10;
        returns
            .into_iter()
            .map(|r| {
                rate *= f64::exp(r);
                rate
            })
            .collect()
    })
}

fn arb_features() -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(prop::collection::vec(-1000.0f64..1000.0, 3), 1..120)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ===================================================================
    // INVARIANT 1: Every record lands in exactly one outcome.
    // ===================================================================
    #[test]
    fn every_record_classified_once(
        (ledger, bank) in arb_feeds(),
        tolerance in arb_tolerance(),
        fallback in any::<bool>(),
    ) {
        let (ledger_len, bank_len) = (ledger.len(), bank.len());
        let outcomes = Reconciler::new(tolerance)
            .with_fallback_matching(fallback)
            .reconcile_records(ledger, bank);
        let result = ReconciliationResult::from_outcomes(outcomes);

        prop_assert_eq!(result.record_coverage(), ledger_len + bank_len);
        prop_assert!(result.verify_completeness(ledger_len, bank_len));
    }

    // ===================================================================
    // INVARIANT 2: Classification is deterministic, ordering included.
    // ===================================================================
    #[test]
    fn reconciliation_is_deterministic((ledger, bank) in arb_feeds(), tolerance in arb_tolerance()) {
        let reconciler = Reconciler::new(tolerance);
        let first = reconciler.reconcile_records(ledger.clone(), bank.clone());
        let second = reconciler.reconcile_records(ledger, bank);
        prop_assert_eq!(first, second);
    }

    // ===================================================================
    // INVARIANT 3: The amount tolerance is inclusive; one cent more is
    // a mismatch.
    // ===================================================================
    #[test]
    fn tolerance_boundary_is_inclusive(amount in arb_amount(), cents in 0i64..10_000) {
        let tolerance = Decimal::new(cents, 2);
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let eur = CurrencyCode::new("EUR");
        let classify = |bank_amount: Decimal| {
            let ledger = vec![TransactionRecord::new(SourceSystem::Ledger, 0, day, eur.clone(), amount).with_reference("X")];
            let bank = vec![TransactionRecord::new(SourceSystem::Bank, 0, day, eur.clone(), bank_amount).with_reference("X")];
            Reconciler::new(MatchTolerance::new(tolerance, 0)).reconcile_records(ledger, bank)[0].classification()
        };

        prop_assert_eq!(classify(amount + tolerance), Classification::Match);
        prop_assert_eq!(classify(amount - tolerance), Classification::Match);
        prop_assert_eq!(classify(amount + tolerance + Decimal::new(1, 2)), Classification::Mismatch);
    }

    // ===================================================================
    // INVARIANT 4: Higher confidence never lowers VaR.
    // ===================================================================
    #[test]
    fn var_monotonic_in_confidence(series in arb_series(), seed in any::<u64>()) {
        let v95 = simulate(&series, 10, 200, 0.95, seed).unwrap().value_at_risk;
        let v99 = simulate(&series, 10, 200, 0.99, seed).unwrap().value_at_risk;
        prop_assert!(v99 >= v95, "VaR99 {} < VaR95 {}", v99, v95);
    }

    // ===================================================================
    // INVARIANT 5: Same seed, same paths.
    // ===================================================================
    #[test]
    fn simulation_is_reproducible(series in arb_series(), seed in any::<u64>()) {
        let first = simulate(&series, 5, 50, 0.95, seed).unwrap();
        let second = simulate(&series, 5, 50, 0.95, seed).unwrap();
        prop_assert_eq!(first.paths, second.paths);
        prop_assert_eq!(first.value_at_risk, second.value_at_risk);
    }

    // ===================================================================
    // INVARIANT 6: Scores lie in (0, 1] and are reproducible.
    // ===================================================================
    #[test]
    fn anomaly_scores_in_range(features in arb_features(), seed in any::<u64>()) {
        let scores = fit_and_score(&features, 20, 32, 0.6, seed).unwrap();
        prop_assert_eq!(scores.len(), features.len());
        for s in &scores {
            prop_assert!(s.score > 0.0 && s.score <= 1.0, "score {} out of range", s.score);
            prop_assert_eq!(s.is_anomaly, s.score > 0.6);
        }
        prop_assert_eq!(scores, fit_and_score(&features, 20, 32, 0.6, seed).unwrap());
    }
}
