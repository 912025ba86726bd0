//! Tunable policy and training parameters.
//!
//! Defaults carry the calibrated constants; JSON files may override any subset
//! of fields.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::classifier::ForestConfig;
use crate::error::{IbfError, Result};
use crate::features::RiskTier;
use crate::scaler::ZeroVariancePolicy;

// ── Inference policy ──────────────────────────────────────────────────────────

/// What to do when the derived season has no code in the season encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonFallback {
    /// Fail the call with `SeasonEncoding`.
    #[default]
    Reject,
    /// Substitute this season code and log a warning.
    DefaultCode(usize),
}

/// Constants of the composite IBF score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IbfPolicy {
    /// Population density contributing one vulnerability point. Default 5000.
    pub population_divisor: f64,
    /// Infrastructure index of a fully resilient district. Default 10.
    pub infrastructure_ceiling: f64,
    /// Raw vulnerability mapped to 1.0. Default 15.
    pub vulnerability_scale: f64,
    /// Weight of P(High). Default 0.6.
    pub likelihood_weight: f64,
    /// Weight of normalized vulnerability. Default 0.4.
    pub vulnerability_weight: f64,
    /// Scores strictly above this are High. Default 0.7.
    pub high_threshold: f64,
    /// Scores strictly above this (and not High) are Moderate. Default 0.4.
    pub moderate_threshold: f64,
    /// Rainfall strictly above this derives "Monsoon". Default 200 mm.
    pub monsoon_rainfall_mm: f64,
    pub season_fallback: SeasonFallback,
}

impl Default for IbfPolicy {
    fn default() -> Self {
        Self {
            population_divisor: 5000.0,
            infrastructure_ceiling: 10.0,
            vulnerability_scale: 15.0,
            likelihood_weight: 0.6,
            vulnerability_weight: 0.4,
            high_threshold: 0.7,
            moderate_threshold: 0.4,
            monsoon_rainfall_mm: 200.0,
            season_fallback: SeasonFallback::Reject,
        }
    }
}

impl IbfPolicy {
    pub fn load(path: &Path) -> Result<Self> {
        let policy: Self = load_json(path)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_divisor <= 0.0 || self.vulnerability_scale <= 0.0 {
            return Err(IbfError::Config("vulnerability divisors must be positive".into()));
        }
        if self.likelihood_weight < 0.0 || self.vulnerability_weight < 0.0 {
            return Err(IbfError::Config("blend weights must be non-negative".into()));
        }
        if self.likelihood_weight + self.vulnerability_weight > 1.0 + 1e-9 {
            return Err(IbfError::Config("blend weights must sum to at most 1".into()));
        }
        if !(0.0 <= self.moderate_threshold
            && self.moderate_threshold < self.high_threshold
            && self.high_threshold <= 1.0)
        {
            return Err(IbfError::Config(format!(
                "thresholds must satisfy 0 <= moderate ({}) < high ({}) <= 1",
                self.moderate_threshold, self.high_threshold
            )));
        }
        Ok(())
    }

    /// `popDensity / 5000 + (10 - infraIndex)` with the default constants.
    pub fn vulnerability_raw(&self, population_density: f64, infrastructure_index: f64) -> f64 {
        population_density / self.population_divisor
            + (self.infrastructure_ceiling - infrastructure_index)
    }

    /// Raw vulnerability over the scale, capped at 1 and floored at 0.
    pub fn vulnerability_norm(&self, population_density: f64, infrastructure_index: f64) -> f64 {
        let raw = self.vulnerability_raw(population_density, infrastructure_index);
        (raw / self.vulnerability_scale).min(1.0).max(0.0)
    }

    pub fn ibf_score(&self, likelihood: f64, vulnerability_norm: f64) -> f64 {
        self.likelihood_weight * likelihood + self.vulnerability_weight * vulnerability_norm
    }

    /// Strict comparisons: a score exactly on a threshold falls to the lower tier.
    pub fn tier(&self, score: f64) -> RiskTier {
        if score > self.high_threshold {
            RiskTier::High
        } else if score > self.moderate_threshold {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        }
    }
}

// ── Training ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Held-out fraction for accuracy reporting. Default 0.2.
    pub test_ratio: f64,
    pub split_seed: u64,
    pub forest: ForestConfig,
    pub zero_variance: ZeroVariancePolicy,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            split_seed: 42,
            forest: ForestConfig::default(),
            zero_variance: ZeroVariancePolicy::Reject,
        }
    }
}

impl TrainingConfig {
    pub fn load(path: &Path) -> Result<Self> {
        load_json(path)
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .map_err(|e| IbfError::Config(format!("reading {}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| IbfError::Config(format!("parsing {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn vulnerability_reference_values() {
        let p = IbfPolicy::default();
        assert_relative_eq!(p.vulnerability_raw(5000.0, 10.0), 1.0);
        assert_relative_eq!(p.vulnerability_norm(5000.0, 10.0), 1.0 / 15.0);
        assert_relative_eq!(p.vulnerability_raw(25000.0, 1.0), 14.0);
        assert_relative_eq!(p.vulnerability_norm(25000.0, 1.0), 14.0 / 15.0);
    }

    #[test]
    fn vulnerability_norm_is_capped() {
        let p = IbfPolicy::default();
        assert_relative_eq!(p.vulnerability_norm(50000.0, 1.0), 1.0);
        assert_relative_eq!(p.vulnerability_norm(100.0, 12.0), 0.0);
    }

    #[test]
    fn tier_boundaries_fall_to_lower_band() {
        let p = IbfPolicy::default();
        assert_eq!(p.tier(0.7), RiskTier::Moderate);
        assert_eq!(p.tier(0.700_000_1), RiskTier::High);
        assert_eq!(p.tier(0.4), RiskTier::Low);
        assert_eq!(p.tier(0.400_000_1), RiskTier::Moderate);
        assert_eq!(p.tier(0.0), RiskTier::Low);
        assert_eq!(p.tier(1.0), RiskTier::High);
    }

    #[test]
    fn blend_weights() {
        let p = IbfPolicy::default();
        assert_relative_eq!(p.ibf_score(1.0, 0.0), 0.6);
        assert_relative_eq!(p.ibf_score(0.0, 1.0), 0.4);
        assert_relative_eq!(p.ibf_score(0.5, 0.5), 0.5);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{"high_threshold": 0.8, "season_fallback": {"default_code": 0}}"#;
        let p: IbfPolicy = serde_json::from_str(json).unwrap();
        assert_relative_eq!(p.high_threshold, 0.8);
        assert_relative_eq!(p.likelihood_weight, 0.6);
        assert_eq!(p.season_fallback, SeasonFallback::DefaultCode(0));

        let t: TrainingConfig = serde_json::from_str(r#"{"forest": {"n_trees": 10}}"#).unwrap();
        assert_eq!(t.forest.n_trees, 10);
        assert_eq!(t.forest.max_depth, 15);
        assert_relative_eq!(t.test_ratio, 0.2);
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let p = IbfPolicy { moderate_threshold: 0.8, ..Default::default() };
        assert!(p.validate().is_err());
        assert!(IbfPolicy::default().validate().is_ok());
    }
}
