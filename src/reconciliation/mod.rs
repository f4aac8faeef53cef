//! Ledger-to-bank reconciliation as an explicit two-sided hash join.

pub mod matcher;
pub mod outcome;

pub use matcher::{reconcile, MatchKey, MatchTolerance, Reconciler};
pub use outcome::{
    Classification, ClassifiedOutcome, MismatchReason, ReconciliationResult,
    ReconciliationSummary,
};
