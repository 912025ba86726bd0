//! Feature vector layout shared by training and inference.
//!
//! The classifier consumes `[region_code, season_code, scaled numerics...]`
//! with the numerics in `NUMERIC_FEATURES` order. The scaler is fitted on the
//! same order, so any reordering here silently misapplies scaling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IbfError, Result};

// ── Column layout ─────────────────────────────────────────────────────────────

pub const REGION: &str = "Region";
pub const SEASON: &str = "Season";
pub const RISK_LEVEL: &str = "RiskLevel";

/// Numeric columns in scaler order.
pub const NUMERIC_FEATURES: [&str; 9] = [
    "Rainfall",
    "Temperature",
    "Humidity",
    "SoilMoisture",
    "RiverLevel",
    "WindSpeed",
    "Pressure",
    "PopulationDensity",
    "InfrastructureIndex",
];

pub const N_NUMERIC: usize = NUMERIC_FEATURES.len();

/// Full classifier input order: the two categorical codes, then the numerics.
pub fn model_feature_names() -> Vec<String> {
    [REGION, SEASON]
        .into_iter()
        .chain(NUMERIC_FEATURES)
        .map(str::to_owned)
        .collect()
}

pub const MONSOON: &str = "Monsoon";
pub const SUMMER: &str = "Summer";

/// Season fed to the model, derived from rainfall alone.
///
/// The caller-selected season is discarded: anything strictly above
/// `monsoon_threshold_mm` is "Monsoon", everything else "Summer".
pub fn derive_season(rainfall_mm: f64, monsoon_threshold_mm: f64) -> &'static str {
    if rainfall_mm > monsoon_threshold_mm {
        MONSOON
    } else {
        SUMMER
    }
}

// ── Risk tiers ────────────────────────────────────────────────────────────────

/// Ordered risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    pub const ALL: [RiskTier; 3] = [RiskTier::Low, RiskTier::Moderate, RiskTier::High];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Moderate => "Moderate",
            RiskTier::High => "High",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RiskTier {
    type Err = IbfError;

    fn from_str(s: &str) -> Result<Self> {
        RiskTier::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| IbfError::UnknownCategory { field: RISK_LEVEL.into(), label: s.into() })
    }
}

// ── Inputs ────────────────────────────────────────────────────────────────────

/// The eleven raw inputs to a single risk assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskInputs {
    pub region: String,
    /// Caller-selected season. Not fed to the model; see [`derive_season`].
    pub season: String,
    /// mm, ≥ 0.
    pub rainfall: f64,
    /// °C.
    pub temperature: f64,
    /// %, 0–100.
    pub humidity: f64,
    /// %, 0–100.
    pub soil_moisture: f64,
    /// m, ≥ 0.
    pub river_level: f64,
    /// km/h, ≥ 0.
    pub wind_speed: f64,
    /// hPa.
    pub pressure: f64,
    /// People per km², > 0.
    pub population_density: f64,
    /// 1 (poor) – 10 (resilient).
    pub infrastructure_index: f64,
}

impl RiskInputs {
    /// Numeric values in `NUMERIC_FEATURES` order.
    pub fn numeric_vector(&self) -> [f64; N_NUMERIC] {
        [
            self.rainfall,
            self.temperature,
            self.humidity,
            self.soil_moisture,
            self.river_level,
            self.wind_speed,
            self.pressure,
            self.population_density,
            self.infrastructure_index,
        ]
    }

    /// Reject NaN and infinities; range checks are left to the caller.
    pub fn ensure_finite(&self) -> Result<()> {
        for (name, v) in NUMERIC_FEATURES.iter().zip(self.numeric_vector()) {
            if !v.is_finite() {
                return Err(IbfError::NonFiniteInput { feature: (*name).into() });
            }
        }
        Ok(())
    }
}

impl Default for RiskInputs {
    /// Mid-range readings for a temperate, dry day.
    fn default() -> Self {
        Self {
            region: "Delhi".into(),
            season: SUMMER.into(),
            rainfall: 100.0,
            temperature: 30.0,
            humidity: 60.0,
            soil_moisture: 50.0,
            river_level: 5.0,
            wind_speed: 20.0,
            pressure: 1010.0,
            population_density: 1000.0,
            infrastructure_index: 5.0,
        }
    }
}

/// Categorical codes plus scaled numerics; the only input the classifier accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedFeatureVector {
    pub region_code: usize,
    pub season_code: usize,
    pub scaled: [f64; N_NUMERIC],
}

impl EncodedFeatureVector {
    pub fn as_model_input(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(2 + N_NUMERIC);
        v.push(self.region_code as f64);
        v.push(self.season_code as f64);
        v.extend_from_slice(&self.scaled);
        v
    }
}
