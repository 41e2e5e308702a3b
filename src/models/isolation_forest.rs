//! Isolation Forest implementation
//!
//! Anomaly detection using isolation trees. Anomalies are easier to isolate
//! and thus have shorter path lengths in the trees.

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::dataset::TrainingMatrix;

/// Euler-Mascheroni constant used in the harmonic number approximation
const EULER_GAMMA: f64 = 0.5772156649;

/// Isolation Forest model
///
/// Immutable after [`IsolationForest::fit`]; safe to share across threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Individual isolation trees
    trees: Vec<IsolationTree>,
    /// Rows drawn per tree (ψ)
    sample_size: usize,
    /// Depth limit, ⌈log2 ψ⌉
    max_depth: usize,
    /// Feature width the trees were built on
    n_features: usize,
    /// c(ψ), the score normalization factor
    avg_path_length: f64,
    /// Master seed the per-tree seeds were drawn from
    seed: u64,
}

impl IsolationForest {
    /// Build `num_trees` trees, each on `sample_size` rows drawn without replacement
    ///
    /// Per-tree seeds are drawn from `seed` up front, so the forest is the same
    /// whether the trees are built sequentially or in parallel. The caller
    /// guarantees `2 <= sample_size <= data.n_rows()`.
    pub fn fit(data: &TrainingMatrix, num_trees: usize, sample_size: usize, seed: u64) -> Self {
        let n_rows = data.n_rows();
        let n_features = data.width();
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let mut master = StdRng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..num_trees).map(|_| master.random()).collect();

        let build = |tree_seed: u64| {
            let mut rng = StdRng::seed_from_u64(tree_seed);
            let sample: Vec<&[f64]> = rand::seq::index::sample(&mut rng, n_rows, sample_size)
                .iter()
                .map(|idx| data.row(idx))
                .collect();
            IsolationTree::build(&sample, n_features, max_depth, &mut rng)
        };

        #[cfg(feature = "parallel")]
        let trees: Vec<IsolationTree> = tree_seeds.into_par_iter().map(build).collect();
        #[cfg(not(feature = "parallel"))]
        let trees: Vec<IsolationTree> = tree_seeds.into_iter().map(build).collect();

        Self {
            trees,
            sample_size,
            max_depth,
            n_features,
            avg_path_length: average_path_length(sample_size),
            seed,
        }
    }

    /// Anomaly score `2^(-E[h(x)] / c(ψ))`, higher = more anomalous
    ///
    /// The caller guarantees `sample.len() == self.n_features()`.
    pub fn score(&self, sample: &[f64]) -> f64 {
        if self.trees.is_empty() || self.avg_path_length == 0.0 {
            return 0.5;
        }

        2.0_f64.powf(-self.mean_path_length(sample) / self.avg_path_length)
    }

    /// Average path length across all trees
    pub fn mean_path_length(&self, sample: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.path_length(sample)).sum();
        total / self.trees.len().max(1) as f64
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// c(ψ) for this forest's subsample size
    pub fn normalizer(&self) -> f64 {
        self.avg_path_length
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Average path length of an unsuccessful BST search over `n` points, c(n)
///
/// `c(n) = 2·H(n-1) - 2(n-1)/n` with `H(i) ≈ ln(i) + γ`; `c(n) = 0` for `n <= 1`.
pub fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}

/// A single isolation tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    /// Build an isolation tree from sampled rows
    fn build<R: Rng>(samples: &[&[f64]], n_features: usize, max_depth: usize, rng: &mut R) -> Self {
        Self {
            root: Self::build_node(samples, n_features, 0, max_depth, rng),
        }
    }

    /// Recursively build tree nodes
    fn build_node<R: Rng>(
        samples: &[&[f64]],
        n_features: usize,
        depth: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> IsolationNode {
        let leaf = IsolationNode::Leaf {
            depth,
            size: samples.len(),
        };

        if depth >= max_depth || samples.len() <= 1 {
            return leaf;
        }

        // Only features with spread in this sample can split it
        let candidates: Vec<(usize, f64, f64)> = (0..n_features)
            .filter_map(|idx| {
                let (min, max) = value_range(samples, idx);
                (max > min).then_some((idx, min, max))
            })
            .collect();

        if candidates.is_empty() {
            return leaf;
        }

        let (feature_idx, min_val, max_val) = candidates[rng.random_range(0..candidates.len())];
        let Some(split_value) = split_between(min_val, max_val, rng) else {
            return leaf;
        };

        let (left, right): (Vec<&[f64]>, Vec<&[f64]>) = samples
            .iter()
            .copied()
            .partition(|s| s[feature_idx] < split_value);

        IsolationNode::Internal {
            feature_idx,
            split_value,
            left: Box::new(Self::build_node(&left, n_features, depth + 1, max_depth, rng)),
            right: Box::new(Self::build_node(&right, n_features, depth + 1, max_depth, rng)),
        }
    }

    /// Path length for a sample: leaf depth plus c(leaf size)
    pub fn path_length(&self, sample: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                IsolationNode::Leaf { depth, size } => {
                    return *depth as f64 + average_path_length(*size);
                }
                IsolationNode::Internal {
                    feature_idx,
                    split_value,
                    left,
                    right,
                } => {
                    let val = sample.get(*feature_idx).copied().unwrap_or(f64::NAN);
                    node = if val < *split_value { left.as_ref() } else { right.as_ref() };
                }
            }
        }
    }

}

/// Node in an isolation tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum IsolationNode {
    /// Internal node with split
    Internal {
        feature_idx: usize,
        split_value: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    /// Leaf node
    Leaf { depth: usize, size: usize },
}

#[cfg(test)]
impl IsolationTree {
    fn leaf_count(&self) -> usize {
        self.root.leaf_count()
    }

    fn depth(&self) -> usize {
        self.root.depth()
    }
}

#[cfg(test)]
impl IsolationNode {
    fn leaf_count(&self) -> usize {
        match self {
            IsolationNode::Leaf { .. } => 1,
            IsolationNode::Internal { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }

    fn depth(&self) -> usize {
        match self {
            IsolationNode::Leaf { depth, .. } => *depth,
            IsolationNode::Internal { left, right, .. } => left.depth().max(right.depth()),
        }
    }
}

/// Min and max of one feature over the sample
#[inline]
fn value_range(samples: &[&[f64]], feature_idx: usize) -> (f64, f64) {
    samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
        let v = s[feature_idx];
        (lo.min(v), hi.max(v))
    })
}

/// Uniform split value strictly inside `(min, max)`
///
/// Falls back to the midpoint when the draw lands on a bound; `None` when
/// the two values are adjacent floats and nothing lies between them.
fn split_between<R: Rng>(min: f64, max: f64, rng: &mut R) -> Option<f64> {
    let u: f64 = rng.random();
    let split = min + u * (max - min);
    if split > min && split < max {
        return Some(split);
    }
    let mid = min + (max - min) / 2.0;
    (mid > min && mid < max).then_some(mid)
}
