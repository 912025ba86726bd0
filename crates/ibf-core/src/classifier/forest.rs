//! Bagged ensemble of CART trees with soft voting.
//!
//! Each tree owns an independent RNG stream derived from `seed + tree_index`,
//! so the fitted forest is identical whether trees grow sequentially or on the
//! rayon pool (`threading` feature).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "threading")]
use rayon::prelude::*;

use super::tree::{DecisionTree, TreeConfig};
use super::RiskClassifier;
use crate::error::{IbfError, Result};

pub const RANDOM_FOREST_KIND: &str = "random_forest";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` uses ⌊√n_features⌋.
    pub max_features: Option<usize>,
    /// Draw a bootstrap sample per tree instead of using every row.
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 15,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    n_classes: usize,
    n_features: usize,
    trees: Vec<DecisionTree>,
    /// Mean decrease in impurity per feature, normalized to sum to 1.
    feature_importances: Vec<f64>,
}

impl RandomForest {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        config: &ForestConfig,
    ) -> Result<Self> {
        if config.n_trees == 0 {
            return Err(IbfError::Config("forest needs at least one tree".into()));
        }
        if x.is_empty() {
            return Err(IbfError::EmptyDataset);
        }
        let n_samples = x.len();
        let n_features = x[0].len();
        let tree_config = TreeConfig {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: Some(
                config.max_features.unwrap_or_else(|| ((n_features as f64).sqrt() as usize).max(1)),
            ),
        };

        let grow = |i: usize| -> Result<DecisionTree> {
            let mut rng =
                StdRng::seed_from_u64(config.seed.wrapping_add(i as u64) ^ 0x2C1B_3C6D_8E5F_A7B9);
            let indices: Vec<usize> = if config.bootstrap {
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };
            DecisionTree::fit(x, y, n_classes, &indices, &tree_config, &mut rng)
        };

        #[cfg(feature = "threading")]
        let trees = (0..config.n_trees).into_par_iter().map(grow).collect::<Result<Vec<_>>>()?;
        #[cfg(not(feature = "threading"))]
        let trees = (0..config.n_trees).map(grow).collect::<Result<Vec<_>>>()?;

        let mut feature_importances = vec![0.0; n_features];
        for tree in &trees {
            for (acc, &imp) in feature_importances.iter_mut().zip(tree.importances()) {
                *acc += imp;
            }
        }
        let total: f64 = feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut feature_importances {
                *imp /= total;
            }
        }

        debug!(
            n_trees = trees.len(),
            max_depth = trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
            "random forest grown"
        );

        Ok(Self { config: config.clone(), n_classes, n_features, trees, feature_importances })
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Structural check for a deserialized forest.
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(IbfError::Config("forest has no trees".into()));
        }
        for tree in &self.trees {
            if tree.n_classes() != self.n_classes || tree.n_features() != self.n_features {
                return Err(IbfError::Config("tree shape disagrees with forest".into()));
            }
            tree.validate()?;
        }
        Ok(())
    }
}

impl RiskClassifier for RandomForest {
    fn kind(&self) -> &'static str {
        RANDOM_FOREST_KIND
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_probabilities(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.n_features {
            return Err(IbfError::DimensionMismatch {
                expected: self.n_features,
                found: features.len(),
            });
        }
        let mut probs = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, &p) in probs.iter_mut().zip(tree.leaf_distribution(features)) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        for p in &mut probs {
            *p = (*p / n).clamp(0.0, 1.0);
        }
        Ok(probs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Three separable blobs plus a pure-noise column.
    fn blobs() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(11);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..300 {
            let class = i % 3;
            let centre = [0.0, 3.0, 6.0][class];
            x.push(vec![
                centre + rng.gen_range(-1.0..1.0),
                centre + rng.gen_range(-1.0..1.0),
                rng.gen_range(-5.0..5.0),
            ]);
            y.push(class);
        }
        (x, y)
    }

    fn small() -> ForestConfig {
        ForestConfig { n_trees: 25, max_depth: 8, ..Default::default() }
    }

    #[test]
    fn probabilities_form_a_distribution() {
        let (x, y) = blobs();
        let forest = RandomForest::fit(&x, &y, 3, &small()).unwrap();
        for row in x.iter().take(20) {
            let p = forest.predict_probabilities(row).unwrap();
            assert_eq!(p.len(), 3);
            assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));
            assert_relative_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn separates_blobs() {
        let (x, y) = blobs();
        let config = ForestConfig { max_features: Some(3), ..small() };
        let forest = RandomForest::fit(&x, &y, 3, &config).unwrap();
        assert_eq!(forest.predict_class(&[0.0, 0.0, 0.0]).unwrap(), 0);
        assert_eq!(forest.predict_class(&[3.0, 3.0, 0.0]).unwrap(), 1);
        assert_eq!(forest.predict_class(&[6.0, 6.0, 0.0]).unwrap(), 2);
        // The uniform noise column should matter least.
        let imp = forest.feature_importances();
        assert!(imp[2] < imp[0] && imp[2] < imp[1], "importances {imp:?}");
        assert_relative_eq!(imp.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = blobs();
        let a = RandomForest::fit(&x, &y, 3, &small()).unwrap();
        let b = RandomForest::fit(&x, &y, 3, &small()).unwrap();
        assert_eq!(a, b);
        let point = [2.1, 2.4, -1.0];
        let pa = a.predict_probabilities(&point).unwrap();
        let pb = b.predict_probabilities(&point).unwrap();
        assert!(pa.iter().zip(&pb).all(|(l, r)| l.to_bits() == r.to_bits()));
    }

    #[test]
    fn rejects_wrong_width() {
        let (x, y) = blobs();
        let forest = RandomForest::fit(&x, &y, 3, &small()).unwrap();
        assert!(matches!(
            forest.predict_probabilities(&[1.0]),
            Err(IbfError::DimensionMismatch { expected: 3, found: 1 })
        ));
    }

    #[test]
    fn zero_trees_is_a_config_error() {
        let (x, y) = blobs();
        let config = ForestConfig { n_trees: 0, ..Default::default() };
        assert!(matches!(RandomForest::fit(&x, &y, 3, &config), Err(IbfError::Config(_))));
    }

    #[test]
    fn serde_roundtrip_preserves_predictions() {
        let (x, y) = blobs();
        let forest = RandomForest::fit(&x, &y, 3, &small()).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let back: RandomForest = serde_json::from_str(&json).unwrap();
        back.validate().unwrap();
        assert_eq!(
            forest.predict_probabilities(&x[5]).unwrap(),
            back.predict_probabilities(&x[5]).unwrap()
        );
    }
}
