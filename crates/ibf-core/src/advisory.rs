//! Operational guidance derived from an assessment.
//!
//! Pure lookups over the tier and the raw readings; nothing here feeds back
//! into the score.

use std::fmt;

use serde::Serialize;

use crate::engine::RiskAssessment;
use crate::features::{RiskInputs, RiskTier};

/// Rainfall above this makes flooding the primary threat (mm).
pub const FLOOD_RAINFALL_MM: f64 = 200.0;
/// Wind above this makes a cyclone the primary threat when rain is below the flood line (km/h).
pub const CYCLONE_WIND_KMH: f64 = 80.0;
/// People at risk per unit of population density.
pub const EXPOSURE_FACTOR: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrimaryThreat {
    Flood,
    Cyclone,
    None,
}

impl PrimaryThreat {
    /// Flood wins over cyclone when both readings are extreme.
    pub fn from_readings(rainfall_mm: f64, wind_speed_kmh: f64) -> Self {
        if rainfall_mm > FLOOD_RAINFALL_MM {
            PrimaryThreat::Flood
        } else if wind_speed_kmh > CYCLONE_WIND_KMH {
            PrimaryThreat::Cyclone
        } else {
            PrimaryThreat::None
        }
    }
}

impl fmt::Display for PrimaryThreat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            PrimaryThreat::Flood => "Flood",
            PrimaryThreat::Cyclone => "Cyclone",
            PrimaryThreat::None => "None",
        })
    }
}

pub fn recommended_actions(tier: RiskTier) -> &'static [&'static str] {
    match tier {
        RiskTier::High => &["Evacuate Low-Lying Areas", "Deploy NDRF Teams", "Secure Power Grids"],
        RiskTier::Moderate => &["Pre-position Supplies", "Monitor River Levels", "Alert Hospitals"],
        RiskTier::Low => &["Routine Monitoring"],
    }
}

/// Shelter places to provision.
pub fn shelter_capacity(tier: RiskTier) -> u32 {
    match tier {
        RiskTier::High => 5000,
        RiskTier::Moderate | RiskTier::Low => 2000,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advisory {
    pub tier: RiskTier,
    pub primary_threat: PrimaryThreat,
    pub actions: Vec<String>,
    pub shelter_capacity: u32,
    pub population_at_risk: f64,
}

impl Advisory {
    pub fn from_assessment(inputs: &RiskInputs, assessment: &RiskAssessment) -> Self {
        let tier = assessment.final_tier;
        Self {
            tier,
            primary_threat: PrimaryThreat::from_readings(inputs.rainfall, inputs.wind_speed),
            actions: recommended_actions(tier).iter().map(|s| (*s).to_owned()).collect(),
            shelter_capacity: shelter_capacity(tier),
            population_at_risk: inputs.population_density * EXPOSURE_FACTOR,
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Primary threat:     {}", self.primary_threat)?;
        writeln!(f, "Population at risk: {:.0}", self.population_at_risk)?;
        writeln!(f, "Shelter capacity:   {}", self.shelter_capacity)?;
        write!(f, "Actions:")?;
        for a in &self.actions {
            write!(f, "\n  - {a}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assessment(tier: RiskTier) -> RiskAssessment {
        RiskAssessment {
            final_tier: tier,
            ibf_score: 0.5,
            likelihood: 0.5,
            vulnerability_norm: 0.5,
        }
    }

    #[test]
    fn threat_precedence() {
        assert_eq!(PrimaryThreat::from_readings(250.0, 150.0), PrimaryThreat::Flood);
        assert_eq!(PrimaryThreat::from_readings(200.0, 150.0), PrimaryThreat::Cyclone);
        assert_eq!(PrimaryThreat::from_readings(50.0, 80.0), PrimaryThreat::None);
    }

    #[test]
    fn high_tier_advisory() {
        let inputs =
            RiskInputs { rainfall: 300.0, population_density: 12000.0, ..Default::default() };
        let adv = Advisory::from_assessment(&inputs, &assessment(RiskTier::High));
        assert_eq!(adv.primary_threat, PrimaryThreat::Flood);
        assert_eq!(adv.shelter_capacity, 5000);
        assert_eq!(adv.actions.len(), 3);
        assert_eq!(adv.actions[1], "Deploy NDRF Teams");
        assert_relative_eq!(adv.population_at_risk, 60000.0);
    }

    #[test]
    fn lower_tiers_get_standard_shelter_capacity() {
        assert_eq!(shelter_capacity(RiskTier::Moderate), 2000);
        assert_eq!(shelter_capacity(RiskTier::Low), 2000);
        assert_eq!(recommended_actions(RiskTier::Low), ["Routine Monitoring"]);
        assert!(recommended_actions(RiskTier::Moderate).contains(&"Monitor River Levels"));
    }

    #[test]
    fn display_lists_actions() {
        let adv =
            Advisory::from_assessment(&RiskInputs::default(), &assessment(RiskTier::Moderate));
        let text = adv.to_string();
        assert!(text.contains("Pre-position Supplies"));
        assert!(text.contains("Primary threat:     None"));
    }
}
