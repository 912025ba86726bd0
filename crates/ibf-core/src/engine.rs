//! Online IBF risk engine.
//!
//! One `assess` call:
//!   region → code (unknown region is fatal)
//!   rainfall → derived season → code (see [`SeasonFallback`])
//!   nine numerics → scaled
//!   classifier → P(High) = likelihood
//!   population density + infrastructure → normalized vulnerability
//!   0.6·likelihood + 0.4·vulnerability → IBF score → tier
//!
//! The engine is built once from loaded artifacts and is read-only afterwards;
//! concurrent callers share it through `Arc` without locking.

use serde::Serialize;
use tracing::{trace, warn};

use crate::artifacts::{ArtifactSet, Preprocessing};
use crate::classifier::RiskClassifier;
use crate::config::{IbfPolicy, SeasonFallback};
use crate::error::{IbfError, Result};
use crate::features::{derive_season, EncodedFeatureVector, RiskInputs, RiskTier, N_NUMERIC};

/// Output of one assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskAssessment {
    #[serde(rename = "FinalTier")]
    pub final_tier: RiskTier,
    #[serde(rename = "IBFScore")]
    pub ibf_score: f64,
    /// Classifier probability of the High class.
    #[serde(rename = "Likelihood")]
    pub likelihood: f64,
    #[serde(rename = "VulnerabilityNorm")]
    pub vulnerability_norm: f64,
}

/// Intermediate values of one assessment, for inspection and display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentTrace {
    /// Season the caller supplied; not fed to the model.
    pub requested_season: String,
    /// Season derived from rainfall and fed to the model.
    pub derived_season: String,
    /// True when the derived season was unknown and the fallback code was used.
    pub season_fallback_used: bool,
    pub encoded: EncodedFeatureVector,
    /// (class label, probability) in target-encoder order.
    pub class_probabilities: Vec<(String, f64)>,
    pub vulnerability_raw: f64,
}

#[derive(Debug)]
pub struct IbfEngine {
    preprocessing: Preprocessing,
    classifier: Box<dyn RiskClassifier>,
    policy: IbfPolicy,
    high_code: usize,
}

impl IbfEngine {
    /// Cross-check the pieces and build an engine. Every layout problem is
    /// reported here so `assess` only fails on bad inputs.
    pub fn new<C>(preprocessing: Preprocessing, classifier: C, policy: IbfPolicy) -> Result<Self>
    where
        C: RiskClassifier + 'static,
    {
        preprocessing.check_layout()?;
        policy.validate()?;

        let high_code = preprocessing
            .target_encoder
            .encode(RiskTier::High.as_str())
            .map_err(|_| IbfError::Config("target encoder has no High class".into()))?;

        let n_features = 2 + N_NUMERIC;
        if classifier.n_features() != n_features {
            return Err(IbfError::DimensionMismatch {
                expected: n_features,
                found: classifier.n_features(),
            });
        }
        if classifier.n_classes() != preprocessing.target_encoder.len() {
            return Err(IbfError::SchemaMismatch {
                expected: format!("{} classes", preprocessing.target_encoder.len()),
                found: format!("{} classes", classifier.n_classes()),
            });
        }
        if let SeasonFallback::DefaultCode(code) = policy.season_fallback {
            // Only the range matters; the label itself is never needed.
            preprocessing.season_encoder.decode(code)?;
        }

        Ok(Self { preprocessing, classifier: Box::new(classifier), policy, high_code })
    }

    pub fn from_artifacts(artifacts: ArtifactSet, policy: IbfPolicy) -> Result<Self> {
        Self::new(artifacts.preprocessing, artifacts.classifier, policy)
    }

    pub fn assess(&self, inputs: &RiskInputs) -> Result<RiskAssessment> {
        self.assess_traced(inputs).map(|(assessment, _)| assessment)
    }

    pub fn assess_traced(&self, inputs: &RiskInputs) -> Result<(RiskAssessment, AssessmentTrace)> {
        inputs.ensure_finite()?;

        let region_code = self.preprocessing.region_encoder.encode(&inputs.region)?;
        let derived = derive_season(inputs.rainfall, self.policy.monsoon_rainfall_mm);
        let (season_code, season_fallback_used) = self.season_code(derived)?;
        let scaled = self.preprocessing.scale(&inputs.numeric_vector())?;
        let encoded = EncodedFeatureVector { region_code, season_code, scaled };

        let probabilities = self.classifier.predict_probabilities(&encoded.as_model_input())?;
        let likelihood = probabilities
            .get(self.high_code)
            .copied()
            .ok_or(IbfError::DimensionMismatch {
                expected: self.high_code + 1,
                found: probabilities.len(),
            })?;

        let p = &self.policy;
        let (density, infrastructure) = (inputs.population_density, inputs.infrastructure_index);
        let vulnerability_raw = p.vulnerability_raw(density, infrastructure);
        let vulnerability_norm = p.vulnerability_norm(density, infrastructure);
        let ibf_score = p.ibf_score(likelihood, vulnerability_norm);
        let final_tier = p.tier(ibf_score);

        trace!(
            region = %inputs.region,
            season = derived,
            likelihood,
            vulnerability_norm,
            ibf_score,
            tier = %final_tier,
            "assessed"
        );

        let class_probabilities = self
            .preprocessing
            .target_encoder
            .classes()
            .iter()
            .cloned()
            .zip(probabilities)
            .collect();

        Ok((
            RiskAssessment { final_tier, ibf_score, likelihood, vulnerability_norm },
            AssessmentTrace {
                requested_season: inputs.season.clone(),
                derived_season: derived.to_owned(),
                season_fallback_used,
                encoded,
                class_probabilities,
                vulnerability_raw,
            },
        ))
    }

    fn season_code(&self, season: &str) -> Result<(usize, bool)> {
        match self.preprocessing.season_encoder.encode(season) {
            Ok(code) => Ok((code, false)),
            Err(_) => match self.policy.season_fallback {
                SeasonFallback::Reject => {
                    Err(IbfError::SeasonEncoding { season: season.to_owned() })
                }
                SeasonFallback::DefaultCode(code) => {
                    warn!(season, code, "derived season not in vocabulary; using fallback code");
                    Ok((code, true))
                }
            },
        }
    }

    /// Regions the engine can assess, sorted.
    pub fn regions(&self) -> &[String] {
        self.preprocessing.region_encoder.classes()
    }

    pub fn policy(&self) -> &IbfPolicy {
        &self.policy
    }

    pub fn preprocessing(&self) -> &Preprocessing {
        &self.preprocessing
    }

    pub fn classifier(&self) -> &dyn RiskClassifier {
        self.classifier.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, OnceLock};

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::classifier::ForestConfig;
    use crate::config::TrainingConfig;
    use crate::dataset::{Dataset, DisasterRecord};
    use crate::encoder::LabelEncoder;
    use crate::features::SEASON;
    use crate::synthetic::SyntheticGenerator;
    use crate::training::train;

    /// High iff rainfall > 300 and wind > 100; Moderate if exactly one holds.
    fn hazard_dataset(n: usize, seed: u64) -> Dataset {
        let mut rng = StdRng::seed_from_u64(seed);
        let regions = ["Assam", "Delhi", "Odisha"];
        let records = (0..n)
            .map(|i| {
                let rainfall: f64 = rng.gen_range(0.0..600.0);
                let wind_speed: f64 = rng.gen_range(0.0..200.0);
                let tier = match (rainfall > 300.0, wind_speed > 100.0) {
                    (true, true) => RiskTier::High,
                    (false, false) => RiskTier::Low,
                    _ => RiskTier::Moderate,
                };
                DisasterRecord {
                    region: regions[i % regions.len()].into(),
                    season: derive_season(rainfall, 200.0).into(),
                    rainfall,
                    temperature: rng.gen_range(20.0..40.0),
                    humidity: rng.gen_range(30.0..90.0),
                    soil_moisture: rng.gen_range(10.0..90.0),
                    river_level: rng.gen_range(1.0..10.0),
                    wind_speed,
                    pressure: rng.gen_range(960.0..1015.0),
                    population_density: rng.gen_range(500.0..25000.0),
                    infrastructure_index: rng.gen_range(1.0..10.0),
                    risk_level: tier.as_str().into(),
                }
            })
            .collect();
        Dataset::new(records)
    }

    fn hazard_artifacts() -> &'static ArtifactSet {
        static SET: OnceLock<ArtifactSet> = OnceLock::new();
        SET.get_or_init(|| {
            let config = TrainingConfig {
                forest: ForestConfig { n_trees: 40, max_depth: 12, ..Default::default() },
                ..Default::default()
            };
            train(&hazard_dataset(1500, 7), &config).unwrap().artifacts
        })
    }

    fn hazard_engine() -> IbfEngine {
        IbfEngine::from_artifacts(hazard_artifacts().clone(), IbfPolicy::default()).unwrap()
    }

    fn inputs(region: &str, rainfall: f64, wind_speed: f64) -> RiskInputs {
        RiskInputs { region: region.into(), rainfall, wind_speed, ..Default::default() }
    }

    #[test]
    fn engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<IbfEngine>();
    }

    #[test]
    fn repeated_calls_are_bit_identical() {
        let engine = hazard_engine();
        let x = inputs("Odisha", 320.0, 90.0);
        let first = engine.assess(&x).unwrap();
        for _ in 0..10 {
            let again = engine.assess(&x).unwrap();
            assert_eq!(again.ibf_score.to_bits(), first.ibf_score.to_bits());
            assert_eq!(again.likelihood.to_bits(), first.likelihood.to_bits());
            assert_eq!(again, first);
        }
    }

    #[test]
    fn high_rain_and_wind_in_vulnerable_district_is_high() {
        let engine = hazard_engine();
        let x = RiskInputs {
            region: "Odisha".into(),
            rainfall: 400.0,
            wind_speed: 150.0,
            population_density: 20000.0,
            infrastructure_index: 2.0,
            ..Default::default()
        };
        let (a, trace) = engine.assess_traced(&x).unwrap();
        assert!(a.likelihood > 0.7, "likelihood {:.3}", a.likelihood);
        assert_eq!(a.final_tier, RiskTier::High, "score {:.3}", a.ibf_score);
        assert_eq!(trace.derived_season, "Monsoon");
    }

    #[test]
    fn calm_conditions_in_resilient_district_are_low() {
        let engine = hazard_engine();
        let x = RiskInputs {
            region: "Delhi".into(),
            rainfall: 40.0,
            wind_speed: 10.0,
            population_density: 1000.0,
            infrastructure_index: 9.0,
            ..Default::default()
        };
        let a = engine.assess(&x).unwrap();
        assert!(a.likelihood < 0.2, "likelihood {:.3}", a.likelihood);
        assert_eq!(a.final_tier, RiskTier::Low);
    }

    #[test]
    fn outputs_stay_in_unit_range() {
        let engine = hazard_engine();
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..300 {
            let x = RiskInputs {
                region: "Assam".into(),
                rainfall: rng.gen_range(0.0..800.0),
                wind_speed: rng.gen_range(0.0..250.0),
                population_density: rng.gen_range(1.0..100_000.0),
                infrastructure_index: rng.gen_range(1.0..=10.0),
                ..Default::default()
            };
            let a = engine.assess(&x).unwrap();
            for (name, v) in [
                ("likelihood", a.likelihood),
                ("vulnerability", a.vulnerability_norm),
                ("score", a.ibf_score),
            ] {
                assert!((0.0..=1.0).contains(&v), "{name} = {v} for {x:?}");
            }
        }
    }

    #[test]
    fn unknown_region_is_rejected() {
        let engine = hazard_engine();
        match engine.assess(&inputs("Atlantis", 100.0, 20.0)) {
            Err(IbfError::UnknownCategory { field, label }) => {
                assert_eq!(field, "Region");
                assert_eq!(label, "Atlantis");
            }
            other => panic!("expected UnknownCategory, got {other:?}"),
        }
    }

    #[test]
    fn every_vocabulary_region_succeeds() {
        let engine = hazard_engine();
        assert_eq!(engine.regions(), ["Assam", "Delhi", "Odisha"]);
        for region in engine.regions() {
            engine.assess(&inputs(region, 100.0, 20.0)).unwrap();
        }
    }

    #[test]
    fn season_is_derived_from_rainfall() {
        let engine = hazard_engine();
        let seasons = &engine.preprocessing().season_encoder;

        let mut x = inputs("Assam", 250.0, 20.0);
        x.season = "Winter".into();
        let (_, trace) = engine.assess_traced(&x).unwrap();
        assert_eq!(trace.requested_season, "Winter");
        assert_eq!(trace.derived_season, "Monsoon");
        assert_eq!(trace.encoded.season_code, seasons.encode("Monsoon").unwrap());

        let (_, trace) = engine.assess_traced(&inputs("Assam", 50.0, 20.0)).unwrap();
        assert_eq!(trace.derived_season, "Summer");
        assert_eq!(trace.encoded.season_code, seasons.encode("Summer").unwrap());
        assert!(!trace.season_fallback_used);
    }

    #[test]
    fn requested_season_does_not_change_the_result() {
        let engine = hazard_engine();
        let mut a = inputs("Delhi", 180.0, 60.0);
        let mut b = a.clone();
        a.season = "Winter".into();
        b.season = "Monsoon".into();
        assert_eq!(engine.assess(&a).unwrap(), engine.assess(&b).unwrap());
    }

    #[test]
    fn trace_distribution_matches_assessment() {
        let engine = hazard_engine();
        let (a, trace) = engine.assess_traced(&inputs("Odisha", 350.0, 120.0)).unwrap();
        let total: f64 = trace.class_probabilities.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-9, "probabilities sum to {total}");
        let high = trace.class_probabilities.iter().find(|(l, _)| l == "High").unwrap().1;
        assert_eq!(high, a.likelihood);
        assert_eq!(trace.encoded.region_code, 2);
    }

    fn engine_without_monsoon(fallback: SeasonFallback) -> Result<IbfEngine> {
        let mut artifacts = hazard_artifacts().clone();
        artifacts.preprocessing.season_encoder = LabelEncoder::fit(SEASON, ["Summer", "Winter"]);
        let policy = IbfPolicy { season_fallback: fallback, ..Default::default() };
        IbfEngine::from_artifacts(artifacts, policy)
    }

    #[test]
    fn unknown_derived_season_is_rejected_by_default() {
        let engine = engine_without_monsoon(SeasonFallback::Reject).unwrap();
        match engine.assess(&inputs("Assam", 250.0, 20.0)) {
            Err(IbfError::SeasonEncoding { season }) => assert_eq!(season, "Monsoon"),
            other => panic!("expected SeasonEncoding, got {other:?}"),
        }
        // Summer is still encodable.
        engine.assess(&inputs("Assam", 50.0, 20.0)).unwrap();
    }

    #[test]
    fn unknown_derived_season_uses_opt_in_fallback_code() {
        let engine = engine_without_monsoon(SeasonFallback::DefaultCode(0)).unwrap();
        let (_, trace) = engine.assess_traced(&inputs("Assam", 250.0, 20.0)).unwrap();
        assert!(trace.season_fallback_used);
        assert_eq!(trace.encoded.season_code, 0);
    }

    #[test]
    fn fallback_code_outside_vocabulary_is_rejected_at_construction() {
        let err = engine_without_monsoon(SeasonFallback::DefaultCode(5)).unwrap_err();
        assert!(matches!(err, IbfError::CodeOutOfRange { code: 5, len: 2, .. }), "{err:?}");
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let engine = hazard_engine();
        let x = RiskInputs { humidity: f64::NAN, ..inputs("Assam", 100.0, 20.0) };
        assert!(matches!(
            engine.assess(&x),
            Err(IbfError::NonFiniteInput { feature }) if feature == "Humidity"
        ));
    }

    #[test]
    fn saved_and_reloaded_artifacts_assess_identically() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("model");
        hazard_artifacts().save(&dir).unwrap();

        let original = hazard_engine();
        let reloaded =
            IbfEngine::from_artifacts(ArtifactSet::load(&dir).unwrap(), IbfPolicy::default())
                .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let x = inputs("Delhi", rng.gen_range(0.0..600.0), rng.gen_range(0.0..200.0));
            assert_eq!(original.assess(&x).unwrap(), reloaded.assess(&x).unwrap());
        }
    }

    #[test]
    fn shared_engine_serves_concurrent_callers() {
        let engine = Arc::new(hazard_engine());
        let x = inputs("Odisha", 400.0, 150.0);
        let expected = engine.assess(&x).unwrap();
        std::thread::scope(|s| {
            for _ in 0..4 {
                let engine = Arc::clone(&engine);
                let x = x.clone();
                s.spawn(move || {
                    for _ in 0..20 {
                        assert_eq!(engine.assess(&x).unwrap(), expected);
                    }
                });
            }
        });
    }

    #[test]
    fn mismatched_classifier_width_is_rejected() {
        let artifacts = hazard_artifacts().clone();
        let x = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let narrow = crate::classifier::RandomForest::fit(
            &x,
            &[0, 1],
            3,
            &ForestConfig { n_trees: 1, ..Default::default() },
        )
        .unwrap();
        let err =
            IbfEngine::new(artifacts.preprocessing, narrow, IbfPolicy::default()).unwrap_err();
        assert!(matches!(err, IbfError::DimensionMismatch { expected: 11, found: 2 }), "{err:?}");
    }

    #[test]
    fn likelihood_rises_when_rainfall_crosses_monsoon_threshold() {
        let train_set = SyntheticGenerator::new(42).dataset(2000);
        let config = TrainingConfig {
            forest: ForestConfig { n_trees: 40, max_depth: 12, ..Default::default() },
            ..Default::default()
        };
        let artifacts = train(&train_set, &config).unwrap().artifacts;
        let engine = IbfEngine::from_artifacts(artifacts, IbfPolicy::default()).unwrap();

        let sample = SyntheticGenerator::new(1234).dataset(300);
        let mean_likelihood = |rainfall: f64| -> f64 {
            let total: f64 = sample
                .records
                .iter()
                .map(|r| {
                    let x = RiskInputs { rainfall, ..r.to_inputs() };
                    engine.assess(&x).unwrap().likelihood
                })
                .sum();
            total / sample.len() as f64
        };
        let dry = mean_likelihood(120.0);
        let wet = mean_likelihood(450.0);
        assert!(wet >= dry, "mean likelihood fell from {dry:.4} to {wet:.4}");
    }
}
