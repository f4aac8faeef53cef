use crate::anomaly::features::FeatureVector;
use rand::Rng;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Expected path length of an unsuccessful search in a binary search tree
/// of `n` points, used to normalise isolation depths.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// One random partition tree. Nodes live in a flat arena; index 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    /// Grow a tree over the rows of `data` selected by `sample`.
    ///
    /// Each split picks a feature uniformly among those that still vary in
    /// the node, then a threshold uniformly in `[min, max)`; rows `<=` the
    /// threshold go left. Nodes holding at most one row, or sitting at
    /// `max_depth`, become leaves.
    pub fn grow<R: Rng + ?Sized>(
        data: &[FeatureVector],
        sample: Vec<usize>,
        max_depth: usize,
        rng: &mut R,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(data, sample, 0, max_depth, rng);
        tree
    }

    fn grow_node<R: Rng + ?Sized>(
        &mut self,
        data: &[FeatureVector],
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: rows.len() });
        if rows.len() <= 1 || depth >= max_depth {
            return id;
        }

        let width = rows
            .iter()
            .filter_map(|&r| data.get(r))
            .map(|v| v.len())
            .max()
            .unwrap_or(0);
        // A feature is only split when its range has a finite width.
        let ranges: Vec<(usize, f64, f64)> = (0..width)
            .filter_map(|feature| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    let x = feature_value(data, r, feature);
                    (lo.min(x), hi.max(x))
                });
                (lo < hi && (hi - lo).is_finite()).then_some((feature, lo, hi))
            })
            .collect();
        if ranges.is_empty() {
            // Every row identical: nothing left to isolate.
            return id;
        }

        let (feature, lo, hi) = ranges[rng.gen_range(0..ranges.len())];
        let threshold = rng.gen_range(lo..hi);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| feature_value(data, r, feature) <= threshold);

        let left = self.grow_node(data, left_rows, depth + 1, max_depth, rng);
        let right = self.grow_node(data, right_rows, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    /// Number of splits to reach `point`'s leaf, plus the expected extra
    /// depth for the rows the leaf still holds.
    pub fn path_length(&self, point: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes.get(node) {
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = point.get(*feature).copied().unwrap_or(0.0);
                    node = if x <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Some(Node::Leaf { size }) => return depth + average_path_length(*size),
                None => return depth,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf { .. } => 0,
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

/// Feature `feature` of row `row`; a missing value reads as 0, as in
/// [`IsolationTree::path_length`].
fn feature_value(data: &[FeatureVector], row: usize, feature: usize) -> f64 {
    data.get(row)
        .and_then(|v| v.get(feature))
        .copied()
        .unwrap_or(0.0)
}
