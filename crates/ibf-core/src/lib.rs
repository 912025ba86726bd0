//! Impact-based forecasting (IBF) risk inference for Indian regions.
//!
//! Offline, [`training::train`] fits encoders, a scaler and a random forest on
//! labeled records and returns an [`ArtifactSet`]. Online, an [`IbfEngine`]
//! built from that set blends the forest's P(High) with a rule-based
//! vulnerability score into a final risk tier.

pub mod advisory;
pub mod artifacts;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod scaler;
pub mod synthetic;
pub mod training;
pub mod units;

pub use advisory::{Advisory, PrimaryThreat};
pub use artifacts::{ArtifactSet, Preprocessing, ARTIFACT_SCHEMA_VERSION};
pub use classifier::{ForestConfig, RandomForest, RiskClassifier};
pub use config::{IbfPolicy, SeasonFallback, TrainingConfig};
pub use dataset::{Dataset, DisasterRecord};
pub use engine::{AssessmentTrace, IbfEngine, RiskAssessment};
pub use error::{IbfError, Result};
pub use evaluation::ClassificationReport;
pub use features::{RiskInputs, RiskTier};
pub use scaler::ZeroVariancePolicy;
pub use synthetic::SyntheticGenerator;
pub use training::{train, TrainingOutcome};
