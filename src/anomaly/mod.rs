//! Unsupervised anomaly scoring of enriched records with an isolation forest.

pub mod detector;
pub mod features;
pub mod forest;
pub mod tree;

pub use detector::AnomalyEngine;
pub use features::{FeatureTable, FeatureVector, FEATURE_NAMES};
pub use forest::{fit_and_score, AnomalyScore, ForestParams, IsolationForest};
pub use tree::{average_path_length, IsolationTree};
