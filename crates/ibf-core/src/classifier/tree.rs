//! Multi-class CART decision tree with Gini impurity.
//!
//! Nodes live in a flat arena (root at index 0) so persisted trees never nest
//! deeper than one level in JSON regardless of `max_depth`.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{IbfError, Result};

/// Splits must reduce impurity by more than this to be kept.
const MIN_GAIN: f64 = 1e-12;

/// Growth limits for a single tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` examines all of them.
    pub max_features: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { max_depth: 15, min_samples_split: 2, min_samples_leaf: 1, max_features: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        /// Class frequencies of the training samples that reached this leaf.
        distribution: Vec<f64>,
        n_samples: usize,
    },
    Split {
        feature: usize,
        /// Samples with `x[feature] <= threshold` go left.
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
        impurity: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    n_classes: usize,
    n_features: usize,
    nodes: Vec<TreeNode>,
    /// Unnormalized total impurity decrease per feature.
    importances: Vec<f64>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Borrowed training data shared by every recursive call.
struct Grower<'a> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    n_classes: usize,
    n_features: usize,
    config: &'a TreeConfig,
    nodes: Vec<TreeNode>,
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Grow a tree on the rows of `x` selected by `indices` (duplicates allowed,
    /// which is how bootstrap samples are passed in).
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        indices: &[usize],
        config: &TreeConfig,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if indices.is_empty() || x.is_empty() {
            return Err(IbfError::EmptyDataset);
        }
        if x.len() != y.len() {
            return Err(IbfError::DimensionMismatch { expected: x.len(), found: y.len() });
        }
        let n_features = x[0].len();
        if n_features == 0 {
            return Err(IbfError::DimensionMismatch { expected: 1, found: 0 });
        }
        if let Some(row) = x.iter().find(|r| r.len() != n_features) {
            return Err(IbfError::DimensionMismatch { expected: n_features, found: row.len() });
        }
        if let Some(&label) = y.iter().find(|&&c| c >= n_classes) {
            return Err(IbfError::DimensionMismatch { expected: n_classes, found: label + 1 });
        }

        let mut grower = Grower {
            x,
            y,
            n_classes,
            n_features,
            config,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        grower.grow(indices.to_vec(), 0, rng);

        Ok(Self { n_classes, n_features, nodes: grower.nodes, importances: grower.importances })
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    /// Leaf class distribution for one sample. Caller guarantees the width.
    pub fn leaf_distribution(&self, features: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { distribution, .. } => return distribution,
                TreeNode::Split { feature, threshold, left, right, .. } => {
                    idx = if features[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    /// Structural check for deserialized trees: child links point forward and
    /// in range, leaf distributions have one entry per class.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(IbfError::Config("tree has no nodes".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { distribution, .. } => {
                    if distribution.len() != self.n_classes {
                        return Err(IbfError::DimensionMismatch {
                            expected: self.n_classes,
                            found: distribution.len(),
                        });
                    }
                }
                TreeNode::Split { feature, left, right, .. } => {
                    let in_range = |c: usize| c > i && c < self.nodes.len();
                    if *feature >= self.n_features || !in_range(*left) || !in_range(*right) {
                        return Err(IbfError::Config(format!("tree node {i} has invalid links")));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Grower<'_> {
    fn grow(&mut self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let counts = self.class_counts(&indices);
        let n = indices.len();
        let impurity = gini(&counts, n);

        let splittable = depth < self.config.max_depth
            && n >= self.config.min_samples_split.max(2)
            && impurity > 0.0;
        let candidate = if splittable {
            self.best_split(&indices, &counts, impurity, rng)
        } else {
            None
        };

        let Some(split) = candidate else {
            return self.push_leaf(&counts, n);
        };

        self.importances[split.feature] += split.gain * n as f64;
        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            indices.into_iter().partition(|&i| self.x[i][split.feature] <= split.threshold);

        // Reserve the slot so children always sit after their parent.
        let slot = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { distribution: Vec::new(), n_samples: n });
        let left = self.grow(left_idx, depth + 1, rng);
        let right = self.grow(right_idx, depth + 1, rng);
        self.nodes[slot] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            n_samples: n,
            impurity,
        };
        slot
    }

    fn push_leaf(&mut self, counts: &[usize], n: usize) -> usize {
        let distribution = counts.iter().map(|&c| c as f64 / n as f64).collect();
        self.nodes.push(TreeNode::Leaf { distribution, n_samples: n });
        self.nodes.len() - 1
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in indices {
            counts[self.y[i]] += 1;
        }
        counts
    }

    /// Exhaustive threshold sweep over a random subset of features.
    fn best_split(
        &self,
        indices: &[usize],
        parent_counts: &[usize],
        parent_impurity: f64,
        rng: &mut StdRng,
    ) -> Option<Candidate> {
        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let k = self.config.max_features.unwrap_or(self.n_features).clamp(1, self.n_features);

        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(rng);
        features.truncate(k);

        let mut best: Option<Candidate> = None;
        let mut sorted = indices.to_vec();

        for &f in &features {
            sorted.sort_by(|&a, &b| self.x[a][f].total_cmp(&self.x[b][f]));

            let mut left = vec![0usize; self.n_classes];
            let mut right = parent_counts.to_vec();

            for pos in 1..n {
                let moved = sorted[pos - 1];
                left[self.y[moved]] += 1;
                right[self.y[moved]] -= 1;

                let lo = self.x[moved][f];
                let hi = self.x[sorted[pos]][f];
                if lo == hi || pos < min_leaf || n - pos < min_leaf {
                    continue;
                }

                let weighted = (pos as f64 * gini(&left, pos)
                    + (n - pos) as f64 * gini(&right, n - pos))
                    / n as f64;
                let gain = parent_impurity - weighted;
                if gain > best.as_ref().map_or(MIN_GAIN, |b| b.gain) {
                    let mid = lo + (hi - lo) / 2.0;
                    let threshold = if mid < hi { mid } else { lo };
                    best = Some(Candidate { feature: f, threshold, gain });
                }
            }
        }
        best
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}
