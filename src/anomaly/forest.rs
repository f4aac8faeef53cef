use crate::anomaly::features::FeatureVector;
use crate::anomaly::tree::{average_path_length, IsolationTree};
use crate::core::config::{ConfigurationError, PipelineConfig};
use crate::core::parallel::par_map;
use crate::simulation::seed::{task_rng, ANOMALY_DOMAIN};
use serde::{Deserialize, Serialize};

/// Default score above which a record is flagged.
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Anomaly score in `(0, 1]` and the flag derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScore {
    pub score: f64,
    pub is_anomaly: bool,
}

/// Ensemble settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub num_trees: usize,
    pub subsample_size: usize,
    /// Overrides the `ceil(log2(sample size))` depth cap.
    pub max_depth: Option<usize>,
    pub threshold: f64,
    pub seed: u64,
    pub workers: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            num_trees: 100,
            subsample_size: 256,
            max_depth: None,
            threshold: DEFAULT_THRESHOLD,
            seed: 42,
            workers: 1,
        }
    }
}

impl ForestParams {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            num_trees: config.num_trees,
            subsample_size: config.subsample_size,
            max_depth: config.max_tree_depth,
            threshold: config.anomaly_threshold,
            seed: config.random_seed,
            workers: config.workers(),
        }
    }
}

/// An ensemble of isolation trees fitted on one feature table.
///
/// Records that need few random splits to be isolated score close to 1;
/// records at typical depth score around 0.5.
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    /// Rows per tree actually used; smaller than requested on small inputs.
    sample_size: usize,
    threshold: f64,
    workers: usize,
}

impl IsolationForest {
    /// Fit `num_trees` trees, each on its own subsample drawn without
    /// replacement. With no more rows than `subsample_size`, every tree
    /// sees the full table.
    pub fn fit(data: &[FeatureVector], params: &ForestParams) -> Self {
        let n = data.len();
        let sample_size = params.subsample_size.min(n);
        let max_depth = params
            .max_depth
            .unwrap_or_else(|| depth_limit(sample_size));

        if n <= params.subsample_size {
            log::debug!(
                "{} rows <= subsample size {}, every tree uses the full table",
                n,
                params.subsample_size
            );
        }

        let trees = par_map(params.workers, params.num_trees, |t| {
            let mut rng = task_rng(params.seed ^ ANOMALY_DOMAIN, t as u64);
            let sample: Vec<usize> = if n <= params.subsample_size {
                (0..n).collect()
            } else {
                rand::seq::index::sample(&mut rng, n, sample_size).into_vec()
            };
            IsolationTree::grow(data, sample, max_depth, &mut rng)
        });

        Self {
            trees,
            sample_size,
            threshold: params.threshold,
            workers: params.workers,
        }
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    fn normalise(&self, mean_path: f64) -> f64 {
        let c = average_path_length(self.sample_size);
        if c <= 0.0 {
            // A single-row sample has no meaningful depth.
            return 0.5;
        }
        2f64.powf(-mean_path / c)
    }

    /// Score a single point.
    pub fn score(&self, point: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let total: f64 = self.trees.iter().map(|t| t.path_length(point)).sum();
        self.normalise(total / self.trees.len() as f64)
    }

    /// Score every row. Trees are walked in parallel and their path lengths
    /// summed in tree order, so results do not depend on scheduling.
    pub fn score_all(&self, data: &[FeatureVector]) -> Vec<AnomalyScore> {
        if self.trees.is_empty() {
            return data
                .iter()
                .map(|_| AnomalyScore {
                    score: 0.5,
                    is_anomaly: 0.5 > self.threshold,
                })
                .collect();
        }

        let per_tree = par_map(self.workers, self.trees.len(), |t| {
            data.iter()
                .map(|point| self.trees[t].path_length(point))
                .collect::<Vec<f64>>()
        });

        let mut totals = vec![0.0; data.len()];
        for lengths in &per_tree {
            for (total, length) in totals.iter_mut().zip(lengths) {
                *total += length;
            }
        }

        let trees = self.trees.len() as f64;
        totals
            .into_iter()
            .map(|total| {
                let score = self.normalise(total / trees);
                AnomalyScore {
                    score,
                    is_anomaly: score > self.threshold,
                }
            })
            .collect()
    }
}

/// `ceil(log2(n))`, at least 1.
fn depth_limit(sample_size: usize) -> usize {
    if sample_size <= 2 {
        return 1;
    }
    (usize::BITS - (sample_size - 1).leading_zeros()) as usize
}

/// Fit a forest on `features` and score every row against it.
///
/// `num_trees` must be positive, `subsample_size` at least 2 and
/// `threshold` in `(0, 1]`.
pub fn fit_and_score(
    features: &[FeatureVector],
    num_trees: usize,
    subsample_size: usize,
    threshold: f64,
    seed: u64,
) -> Result<Vec<AnomalyScore>, ConfigurationError> {
    let config = PipelineConfig {
        num_trees,
        subsample_size,
        anomaly_threshold: threshold,
        random_seed: seed,
        ..Default::default()
    };
    config.validate()?;
    let params = ForestParams {
        workers: 1,
        ..ForestParams::from_config(&config)
    };
    Ok(IsolationForest::fit(features, &params).score_all(features))
}
