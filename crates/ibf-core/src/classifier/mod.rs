//! Probabilistic risk classifiers.
//!
//! The engine only sees [`RiskClassifier`]; the tree ensemble behind it can be
//! replaced without touching inference code.

pub mod forest;
pub mod tree;

use std::fmt;

use crate::error::Result;

pub use forest::{ForestConfig, RandomForest};
pub use tree::{DecisionTree, TreeConfig, TreeNode};

/// Maps an encoded, scaled feature vector to a distribution over class codes.
pub trait RiskClassifier: Send + Sync + fmt::Debug {
    /// Stable identifier recorded in the artifact manifest.
    fn kind(&self) -> &'static str;

    fn n_classes(&self) -> usize;

    fn n_features(&self) -> usize;

    /// Probabilities indexed by target-encoder code; each in [0,1], summing to 1.
    fn predict_probabilities(&self, features: &[f64]) -> Result<Vec<f64>>;

    /// Most probable class code. Ties go to the lowest code.
    fn predict_class(&self, features: &[f64]) -> Result<usize> {
        let probs = self.predict_probabilities(features)?;
        Ok(argmax(&probs))
    }
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
