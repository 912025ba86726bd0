//! Persisted artifact set: three encoders, the scaler, the classifier, and a
//! manifest carrying the schema version and feature layout.
//!
//! Layout inside a model directory:
//!   manifest.json         schema version, classifier kind, column order, classes
//!   region_encoder.json
//!   season_encoder.json
//!   target_encoder.json
//!   scaler.json
//!   classifier.json
//!
//! `save` writes a complete staging directory and swaps it into place, so a
//! failed run never leaves a partial set behind. `load` fails fast on any
//! missing, corrupt, or incompatible file.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classifier::forest::RANDOM_FOREST_KIND;
use crate::classifier::{RandomForest, RiskClassifier};
use crate::dataset::DisasterRecord;
use crate::encoder::LabelEncoder;
use crate::error::{IbfError, Result};
use crate::features::{
    model_feature_names, EncodedFeatureVector, NUMERIC_FEATURES, N_NUMERIC, REGION, RISK_LEVEL,
    SEASON,
};
use crate::scaler::StandardScaler;

/// Bump whenever the persisted layout or the feature order changes.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const REGION_ENCODER_FILE: &str = "region_encoder.json";
pub const SEASON_ENCODER_FILE: &str = "season_encoder.json";
pub const TARGET_ENCODER_FILE: &str = "target_encoder.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub schema_version: u32,
    pub classifier_kind: String,
    /// Classifier input columns in order.
    pub model_features: Vec<String>,
    pub numeric_features: Vec<String>,
    /// Target labels by code.
    pub classes: Vec<String>,
    pub n_training_samples: usize,
}

/// Fitted encoders and scaler, everything needed to build a model input.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessing {
    pub region_encoder: LabelEncoder,
    pub season_encoder: LabelEncoder,
    pub target_encoder: LabelEncoder,
    pub scaler: StandardScaler,
}

impl Preprocessing {
    /// Check that the pieces agree with the feature layout compiled into this crate.
    pub fn check_layout(&self) -> Result<()> {
        let expected: Vec<String> = NUMERIC_FEATURES.iter().map(|s| (*s).to_owned()).collect();
        if self.scaler.feature_names != expected {
            return Err(IbfError::SchemaMismatch {
                expected: format!("scaler columns {expected:?}"),
                found: format!("{:?}", self.scaler.feature_names),
            });
        }
        for (enc, field) in [
            (&self.region_encoder, REGION),
            (&self.season_encoder, SEASON),
            (&self.target_encoder, RISK_LEVEL),
        ] {
            if enc.field() != field {
                return Err(IbfError::SchemaMismatch {
                    expected: format!("{field} encoder"),
                    found: format!("{} encoder", enc.field()),
                });
            }
            if enc.is_empty() {
                return Err(IbfError::Config(format!("{field} encoder has no classes")));
            }
        }
        self.scaler.validate()
    }

    /// Encode and scale one training record.
    pub fn encode_record(&self, record: &DisasterRecord) -> Result<EncodedFeatureVector> {
        let region_code = self.region_encoder.encode(&record.region)?;
        let season_code = self.season_encoder.encode(&record.season)?;
        let scaled = self.scale(&record.numeric_vector())?;
        Ok(EncodedFeatureVector { region_code, season_code, scaled })
    }

    pub(crate) fn scale(&self, numeric: &[f64]) -> Result<[f64; N_NUMERIC]> {
        let v = self.scaler.transform(numeric)?;
        v.try_into().map_err(|v: Vec<f64>| IbfError::DimensionMismatch {
            expected: N_NUMERIC,
            found: v.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSet {
    pub manifest: ArtifactManifest,
    pub preprocessing: Preprocessing,
    pub classifier: RandomForest,
}

impl ArtifactSet {
    pub fn new(
        preprocessing: Preprocessing,
        classifier: RandomForest,
        n_training_samples: usize,
    ) -> Self {
        let manifest = ArtifactManifest {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            classifier_kind: classifier.kind().to_owned(),
            model_features: model_feature_names(),
            numeric_features: NUMERIC_FEATURES.iter().map(|s| (*s).to_owned()).collect(),
            classes: preprocessing.target_encoder.classes().to_vec(),
            n_training_samples,
        };
        Self { manifest, preprocessing, classifier }
    }

    /// Write the set to `dir`, replacing any previous set there.
    ///
    /// Files are written into a sibling staging directory first, so a failed
    /// write leaves any previous set untouched. Replacing an existing set takes
    /// two renames: the old directory is moved aside, then the staging
    /// directory is moved in. A concurrent `load` that starts between the two
    /// renames finds no directory and fails with `ArtifactLoad`; retry it.
    /// Once the new set is in place, failing to delete the old one only logs
    /// a warning.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let name = dir
            .file_name()
            .ok_or_else(|| {
                IbfError::Config(format!("model directory {} has no name", dir.display()))
            })?
            .to_string_lossy()
            .into_owned();
        let parent = dir.parent().unwrap_or_else(|| Path::new(""));
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }

        let pid = std::process::id();
        let staging = parent.join(format!(".{name}.staging-{pid}"));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir(&staging)?;

        if let Err(e) = self.write_files(&staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if dir.exists() {
            let retired = parent.join(format!(".{name}.retired-{pid}"));
            if retired.exists() {
                fs::remove_dir_all(&retired)?;
            }
            fs::rename(dir, &retired)?;
            if let Err(e) = fs::rename(&staging, dir) {
                // Put the previous set back before reporting.
                let _ = fs::rename(&retired, dir);
                let _ = fs::remove_dir_all(&staging);
                return Err(e.into());
            }
            if let Err(e) = fs::remove_dir_all(&retired) {
                warn!(dir = %retired.display(), error = %e, "previous artifact set not removed");
            }
        } else {
            fs::rename(&staging, dir)?;
        }

        info!(dir = %dir.display(), version = ARTIFACT_SCHEMA_VERSION, "artifact set saved");
        Ok(())
    }

    fn write_files(&self, dir: &Path) -> Result<()> {
        let p = &self.preprocessing;
        fs::write(dir.join(MANIFEST_FILE), serde_json::to_string_pretty(&self.manifest)?)?;
        fs::write(dir.join(REGION_ENCODER_FILE), serde_json::to_string_pretty(&p.region_encoder)?)?;
        fs::write(dir.join(SEASON_ENCODER_FILE), serde_json::to_string_pretty(&p.season_encoder)?)?;
        fs::write(dir.join(TARGET_ENCODER_FILE), serde_json::to_string_pretty(&p.target_encoder)?)?;
        fs::write(dir.join(SCALER_FILE), serde_json::to_string_pretty(&p.scaler)?)?;
        fs::write(dir.join(CLASSIFIER_FILE), serde_json::to_string(&self.classifier)?)?;
        Ok(())
    }

    /// Load and cross-check a set written by [`ArtifactSet::save`].
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest: ArtifactManifest = read_json(&dir.join(MANIFEST_FILE))?;
        if manifest.schema_version != ARTIFACT_SCHEMA_VERSION {
            return Err(IbfError::SchemaMismatch {
                expected: format!("schema version {ARTIFACT_SCHEMA_VERSION}"),
                found: format!("schema version {}", manifest.schema_version),
            });
        }
        if manifest.model_features != model_feature_names() {
            return Err(IbfError::SchemaMismatch {
                expected: format!("model features {:?}", model_feature_names()),
                found: format!("{:?}", manifest.model_features),
            });
        }

        let region_encoder = read_encoder(&dir.join(REGION_ENCODER_FILE))?;
        let season_encoder = read_encoder(&dir.join(SEASON_ENCODER_FILE))?;
        let target_encoder = read_encoder(&dir.join(TARGET_ENCODER_FILE))?;
        let scaler_path = dir.join(SCALER_FILE);
        let scaler: StandardScaler = read_json(&scaler_path)?;

        let preprocessing =
            Preprocessing { region_encoder, season_encoder, target_encoder, scaler };
        preprocessing.check_layout().map_err(|e| match e {
            IbfError::SchemaMismatch { .. } => e,
            other => IbfError::artifact_load(&scaler_path, other),
        })?;

        if preprocessing.target_encoder.classes() != manifest.classes.as_slice() {
            return Err(IbfError::SchemaMismatch {
                expected: format!("classes {:?}", manifest.classes),
                found: format!("{:?}", preprocessing.target_encoder.classes()),
            });
        }

        let classifier_path = dir.join(CLASSIFIER_FILE);
        let classifier: RandomForest = match manifest.classifier_kind.as_str() {
            RANDOM_FOREST_KIND => read_json(&classifier_path)?,
            other => {
                return Err(IbfError::SchemaMismatch {
                    expected: format!("classifier kind {RANDOM_FOREST_KIND:?}"),
                    found: format!("{other:?}"),
                })
            }
        };
        classifier.validate().map_err(|e| IbfError::artifact_load(&classifier_path, e))?;
        if classifier.n_features() != manifest.model_features.len()
            || classifier.n_classes() != manifest.classes.len()
        {
            return Err(IbfError::SchemaMismatch {
                expected: format!(
                    "{} features / {} classes",
                    manifest.model_features.len(),
                    manifest.classes.len()
                ),
                found: format!(
                    "{} features / {} classes",
                    classifier.n_features(),
                    classifier.n_classes()
                ),
            });
        }

        debug!(dir = %dir.display(), trees = classifier.trees().len(), "artifact set loaded");
        Ok(Self { manifest, preprocessing, classifier })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| IbfError::artifact_load(path, e))?;
    serde_json::from_str(&text).map_err(|e| IbfError::artifact_load(path, e))
}

fn read_encoder(path: &Path) -> Result<LabelEncoder> {
    let raw: LabelEncoder = read_json(path)?;
    LabelEncoder::from_classes(raw.field(), raw.classes().to_vec())
        .map_err(|e| IbfError::artifact_load(path, e))
}
