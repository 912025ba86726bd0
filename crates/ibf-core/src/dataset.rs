//! Labeled historical dataset: CSV loading, column contract, train/test split.
//!
//! Required columns are the eleven features plus `RiskLevel`. Extra columns
//! (city, coordinates, hazard tags) are ignored; a missing column is fatal.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{IbfError, Result};
use crate::features::{
    RiskInputs, RiskTier, NUMERIC_FEATURES, N_NUMERIC, REGION, RISK_LEVEL, SEASON,
};

/// One labeled observation, column names as they appear in the CSV header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DisasterRecord {
    pub region: String,
    pub season: String,
    pub rainfall: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub river_level: f64,
    pub wind_speed: f64,
    pub pressure: f64,
    pub population_density: f64,
    pub infrastructure_index: f64,
    pub risk_level: String,
}

impl DisasterRecord {
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

    /// The record's features as an `assess` request.
    pub fn to_inputs(&self) -> RiskInputs {
        RiskInputs {
            region: self.region.clone(),
            season: self.season.clone(),
            rainfall: self.rainfall,
            temperature: self.temperature,
            humidity: self.humidity,
            soil_moisture: self.soil_moisture,
            river_level: self.river_level,
            wind_speed: self.wind_speed,
            pressure: self.pressure,
            population_density: self.population_density,
            infrastructure_index: self.infrastructure_index,
        }
    }
}

/// Every column the training pipeline reads, in header order.
pub fn required_columns() -> Vec<&'static str> {
    let mut cols = vec![REGION, SEASON];
    cols.extend(NUMERIC_FEATURES);
    cols.push(RISK_LEVEL);
    cols
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub records: Vec<DisasterRecord>,
}

/// Train/test partition of a [`Dataset`].
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<DisasterRecord>,
    pub test: Vec<DisasterRecord>,
}

impl Dataset {
    pub fn new(records: Vec<DisasterRecord>) -> Self {
        Self { records }
    }

    pub fn load_csv(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let dataset = Self::from_reader(BufReader::new(file))?;
        info!(path = %path.display(), samples = dataset.len(), "dataset loaded");
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let headers = rdr.headers()?.clone();
        for column in required_columns() {
            if !headers.iter().any(|h| h == column) {
                return Err(IbfError::MissingColumn { column: column.into() });
            }
        }

        let mut records = Vec::new();
        for (i, row) in rdr.deserialize::<DisasterRecord>().enumerate() {
            // Header is line 1; first data row is line 2.
            let record = row.map_err(|e| IbfError::Dataset { row: i + 2, reason: e.to_string() })?;
            if let Some((name, _)) =
                NUMERIC_FEATURES.iter().zip(record.numeric_vector()).find(|(_, v)| !v.is_finite())
            {
                return Err(IbfError::Dataset {
                    row: i + 2,
                    reason: format!("{name} is not finite"),
                });
            }
            if let Err(e) = record.risk_level.parse::<RiskTier>() {
                return Err(IbfError::Dataset { row: i + 2, reason: e.to_string() });
            }
            records.push(record);
        }

        if records.is_empty() {
            return Err(IbfError::EmptyDataset);
        }
        Ok(Self { records })
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for record in &self.records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.region.as_str())
    }

    pub fn seasons(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.season.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.risk_level.as_str())
    }

    /// Shuffle with `seed` and hold out `round(len * test_ratio)` rows, keeping
    /// at least one row on each side when there are two or more.
    pub fn train_test_split(&self, test_ratio: f64, seed: u64) -> Result<Split> {
        if !(0.0..1.0).contains(&test_ratio) {
            return Err(IbfError::Config(format!("test_ratio must be in [0, 1), got {test_ratio}")));
        }
        let n = self.records.len();
        if n == 0 {
            return Err(IbfError::EmptyDataset);
        }

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15);
        order.shuffle(&mut rng);

        let mut n_test = (n as f64 * test_ratio).round() as usize;
        if test_ratio > 0.0 && n >= 2 {
            n_test = n_test.clamp(1, n - 1);
        }
        let n_test = n_test.min(n - 1);

        let test = order[..n_test].iter().map(|&i| self.records[i].clone()).collect();
        let train = order[n_test..].iter().map(|&i| self.records[i].clone()).collect();
        Ok(Split { train, test })
    }
}
