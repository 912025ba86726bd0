//! Offline training pipeline.
//!
//! Stage order:
//!   1. Fit region / season / target encoders on the full dataset vocabulary
//!   2. Seeded train/test split
//!   3. Fit scaler on the train split only
//!   4. Fit the forest on the encoded + scaled train split
//!   5. Report held-out metrics (observability, never a gate)
//!
//! Encoders see the full vocabulary so held-out rows never hit an unknown
//! category; a region absent from the whole dataset still fails at inference.

use tracing::{info, warn};

use crate::artifacts::{ArtifactSet, Preprocessing};
use crate::classifier::{RandomForest, RiskClassifier};
use crate::config::TrainingConfig;
use crate::dataset::{Dataset, DisasterRecord};
use crate::encoder::LabelEncoder;
use crate::error::{IbfError, Result};
use crate::evaluation::ClassificationReport;
use crate::features::{model_feature_names, RiskTier, NUMERIC_FEATURES, REGION, RISK_LEVEL, SEASON};
use crate::scaler::StandardScaler;

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifacts: ArtifactSet,
    /// `None` when the configuration holds nothing out.
    pub report: Option<ClassificationReport>,
    /// (feature name, normalized importance), descending.
    pub feature_importances: Vec<(String, f64)>,
    pub n_train: usize,
    pub n_test: usize,
}

/// Fit encoders, scaler and forest on `dataset`; nothing is written to disk.
pub fn train(dataset: &Dataset, config: &TrainingConfig) -> Result<TrainingOutcome> {
    if dataset.is_empty() {
        return Err(IbfError::EmptyDataset);
    }
    info!(samples = dataset.len(), "training started");

    // ── 1. Encoders ─────────────────────────────────────────────────────────
    let region_encoder = LabelEncoder::fit(REGION, dataset.regions());
    let season_encoder = LabelEncoder::fit(SEASON, dataset.seasons());
    let target_encoder = LabelEncoder::fit(RISK_LEVEL, dataset.labels());
    if !target_encoder.contains(RiskTier::High.as_str()) {
        warn!("no High samples in dataset; likelihood will always be zero");
    }
    info!(
        regions = region_encoder.len(),
        seasons = season_encoder.len(),
        classes = ?target_encoder.classes(),
        "encoders fitted"
    );

    // ── 2. Split ────────────────────────────────────────────────────────────
    let split = dataset.train_test_split(config.test_ratio, config.split_seed)?;
    info!(train = split.train.len(), test = split.test.len(), "dataset split");

    // ── 3. Scaler (train split only) ────────────────────────────────────────
    let numeric: Vec<Vec<f64>> = split.train.iter().map(|r| r.numeric_vector().to_vec()).collect();
    let scaler = StandardScaler::fit(&NUMERIC_FEATURES, &numeric, config.zero_variance)?;

    let preprocessing = Preprocessing { region_encoder, season_encoder, target_encoder, scaler };

    // ── 4. Classifier ───────────────────────────────────────────────────────
    let (x_train, y_train) = encode_split(&preprocessing, &split.train)?;
    let n_classes = preprocessing.target_encoder.len();
    info!(
        trees = config.forest.n_trees,
        max_depth = config.forest.max_depth,
        "fitting random forest"
    );
    let forest = RandomForest::fit(&x_train, &y_train, n_classes, &config.forest)?;

    // ── 5. Held-out report ──────────────────────────────────────────────────
    let report = if split.test.is_empty() {
        None
    } else {
        let (x_test, y_test) = encode_split(&preprocessing, &split.test)?;
        let predicted =
            x_test.iter().map(|x| forest.predict_class(x)).collect::<Result<Vec<_>>>()?;
        let classes = preprocessing.target_encoder.classes();
        let report = ClassificationReport::compute(classes, &y_test, &predicted);
        info!(accuracy = format!("{:.4}", report.accuracy), "held-out evaluation");
        Some(report)
    };

    let mut feature_importances: Vec<(String, f64)> = model_feature_names()
        .into_iter()
        .zip(forest.feature_importances().iter().copied())
        .collect();
    feature_importances.sort_by(|a, b| b.1.total_cmp(&a.1));

    let n_train = split.train.len();
    let n_test = split.test.len();
    Ok(TrainingOutcome {
        artifacts: ArtifactSet::new(preprocessing, forest, n_train),
        report,
        feature_importances,
        n_train,
        n_test,
    })
}

fn encode_split(
    pre: &Preprocessing,
    records: &[DisasterRecord],
) -> Result<(Vec<Vec<f64>>, Vec<usize>)> {
    let mut x = Vec::with_capacity(records.len());
    let mut y = Vec::with_capacity(records.len());
    for r in records {
        x.push(pre.encode_record(r)?.as_model_input());
        y.push(pre.target_encoder.encode(&r.risk_level)?);
    }
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ForestConfig;
    use crate::synthetic::SyntheticGenerator;

    fn quick_config() -> TrainingConfig {
        TrainingConfig {
            forest: ForestConfig { n_trees: 30, max_depth: 12, ..Default::default() },
            ..Default::default()
        }
    }

    #[test]
    fn trains_on_synthetic_data_with_useful_accuracy() {
        let ds = SyntheticGenerator::new(42).dataset(1500);
        let outcome = train(&ds, &quick_config()).unwrap();
        assert_eq!(outcome.n_train + outcome.n_test, 1500);
        assert_eq!(outcome.n_test, 300);

        let report = outcome.report.expect("held-out report");
        assert!(report.accuracy > 0.7, "accuracy {:.3}", report.accuracy);
        assert_eq!(report.n_samples, 300);

        let classes = outcome.artifacts.preprocessing.target_encoder.classes().to_vec();
        assert_eq!(classes, vec!["High", "Low", "Moderate"]);
        let imp_total: f64 = outcome.feature_importances.iter().map(|(_, v)| v).sum();
        assert!((imp_total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn encoders_cover_full_vocabulary() {
        let ds = SyntheticGenerator::new(5).dataset(400);
        let config = TrainingConfig {
            forest: ForestConfig { n_trees: 5, ..Default::default() },
            ..Default::default()
        };
        let outcome = train(&ds, &config).unwrap();
        let pre = &outcome.artifacts.preprocessing;
        for r in &ds.records {
            assert!(pre.region_encoder.contains(&r.region));
            assert!(pre.season_encoder.contains(&r.season));
        }
    }

    #[test]
    fn training_is_deterministic() {
        let ds = SyntheticGenerator::new(8).dataset(300);
        let config = TrainingConfig {
            forest: ForestConfig { n_trees: 8, ..Default::default() },
            ..Default::default()
        };
        let a = train(&ds, &config).unwrap();
        let b = train(&ds, &config).unwrap();
        assert_eq!(a.artifacts, b.artifacts);
    }

    #[test]
    fn no_holdout_means_no_report() {
        let ds = SyntheticGenerator::new(1).dataset(100);
        let config = TrainingConfig {
            test_ratio: 0.0,
            forest: ForestConfig { n_trees: 3, ..Default::default() },
            ..Default::default()
        };
        let outcome = train(&ds, &config).unwrap();
        assert!(outcome.report.is_none());
        assert_eq!(outcome.n_train, 100);
    }

    #[test]
    fn empty_dataset_is_rejected() {
        assert!(matches!(train(&Dataset::default(), &quick_config()), Err(IbfError::EmptyDataset)));
    }
}
