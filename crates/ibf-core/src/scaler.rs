//! Per-column standardization: `(x - mean) / std`.
//!
//! The standard deviation is the population form (divide by N). Parameters are
//! immutable after `fit`; `transform` is a pure per-column affine map.

use serde::{Deserialize, Serialize};

use crate::error::{IbfError, Result};

/// Stds at or below this many ulps of the column mean count as zero; summation
/// error alone leaves a constant column with a std of about one ulp.
const DEGENERATE_STD_ULPS: f64 = 10.0;

/// What `transform` does when a fitted std is (numerically) zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    /// Fail with `DegenerateFeature`.
    #[default]
    Reject,
    /// Treat std as 1, i.e. only centre the column.
    UnitScale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Column names in fit order.
    pub feature_names: Vec<String>,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
    #[serde(default)]
    pub zero_variance: ZeroVariancePolicy,
}

impl StandardScaler {
    /// Fit on `rows` (N samples × M columns).
    pub fn fit(
        feature_names: &[&str],
        rows: &[Vec<f64>],
        zero_variance: ZeroVariancePolicy,
    ) -> Result<Self> {
        let m = feature_names.len();
        if rows.is_empty() {
            return Err(IbfError::EmptyDataset);
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != m) {
            return Err(IbfError::DimensionMismatch { expected: m, found: bad.len() });
        }

        let n = rows.len() as f64;
        let mut means = vec![0.0; m];
        for row in rows {
            for (acc, &v) in means.iter_mut().zip(row) {
                *acc += v;
            }
        }
        for acc in &mut means {
            *acc /= n;
        }

        let mut stds = vec![0.0; m];
        for row in rows {
            for ((acc, &v), &mu) in stds.iter_mut().zip(row).zip(&means) {
                *acc += (v - mu).powi(2);
            }
        }
        for acc in &mut stds {
            *acc = (*acc / n).sqrt();
        }

        let scaler = Self {
            feature_names: feature_names.iter().map(|s| (*s).to_owned()).collect(),
            means,
            stds,
            zero_variance,
        };
        if zero_variance == ZeroVariancePolicy::Reject {
            scaler.check_degenerate()?;
        }
        Ok(scaler)
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.n_features() {
            return Err(IbfError::DimensionMismatch {
                expected: self.n_features(),
                found: values.len(),
            });
        }
        values
            .iter()
            .enumerate()
            .map(|(i, &x)| Ok((x - self.means[i]) / self.effective_std(i)?))
            .collect()
    }

    pub fn transform_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    /// Check that parameters are self-consistent, e.g. after deserialization.
    pub fn validate(&self) -> Result<()> {
        let m = self.n_features();
        for len in [self.means.len(), self.stds.len()] {
            if len != m {
                return Err(IbfError::DimensionMismatch { expected: m, found: len });
            }
        }
        if self.zero_variance == ZeroVariancePolicy::Reject {
            self.check_degenerate()?;
        }
        Ok(())
    }

    /// Whether column `i` is constant up to rounding in the fitted mean.
    fn is_degenerate(&self, i: usize) -> bool {
        self.stds[i] <= DEGENERATE_STD_ULPS * f64::EPSILON * self.means[i].abs().max(1.0)
    }

    fn effective_std(&self, i: usize) -> Result<f64> {
        if !self.is_degenerate(i) {
            return Ok(self.stds[i]);
        }
        match self.zero_variance {
            ZeroVariancePolicy::UnitScale => Ok(1.0),
            ZeroVariancePolicy::Reject => {
                Err(IbfError::DegenerateFeature { feature: self.feature_names[i].clone() })
            }
        }
    }

    fn check_degenerate(&self) -> Result<()> {
        match (0..self.n_features()).find(|&i| self.is_degenerate(i)) {
            Some(i) => Err(IbfError::DegenerateFeature { feature: self.feature_names[i].clone() }),
            None => Ok(()),
        }
    }
}
