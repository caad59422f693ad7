// src/standardize.rs
//
// Puts morphology measurements taken under different imaging setups on a
// common scale: Yeo–Johnson power transform followed by (x - mean) / scale,
// with per-feature statistics looked up under the acquisition-configuration
// key (objective, resolution, calibration percentile).

use crate::config::StandardizationConfig;
use crate::error::{CorrelatorError, Result};
use crate::morphology::MorphologyDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub lambda: f64,
    pub mean: f64,
    pub scale: f64,
}

/// `{ "<configuration key>": { "<feature>_mean": { lambda, mean, scale } } }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsTable {
    configurations: BTreeMap<String, BTreeMap<String, FeatureStats>>,
}

impl StatsTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| CorrelatorError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| CorrelatorError::StatsParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn insert(&mut self, key: impl Into<String>, stats: BTreeMap<String, FeatureStats>) {
        self.configurations.insert(key.into(), stats);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.configurations.keys().map(String::as_str)
    }
}

/// Yeo–Johnson power transform. Pure; the input is not modified.
pub fn yeo_johnson(x: f64, lambda: f64) -> f64 {
    if x >= 0.0 {
        if lambda == 0.0 {
            (x + 1.0).ln()
        } else {
            ((x + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if lambda == 2.0 {
        -(1.0 - x).ln()
    } else {
        let p = 2.0 - lambda;
        -((1.0 - x).powf(p) - 1.0) / p
    }
}

/// Inverse of [`yeo_johnson`]. The transform preserves sign, so the branch
/// is chosen on `y`.
pub fn inverse_yeo_johnson(y: f64, lambda: f64) -> f64 {
    if y >= 0.0 {
        if lambda == 0.0 {
            y.exp() - 1.0
        } else {
            (lambda * y + 1.0).powf(1.0 / lambda) - 1.0
        }
    } else if lambda == 2.0 {
        1.0 - (-y).exp()
    } else {
        let p = 2.0 - lambda;
        1.0 - (1.0 - p * y).powf(1.0 / p)
    }
}

/// Statistics for one acquisition configuration, resolved at setup so a
/// missing key aborts before any frame is processed.
#[derive(Debug, Clone)]
pub struct FeatureStandardizer {
    key: String,
    stats: BTreeMap<String, FeatureStats>,
}

impl FeatureStandardizer {
    pub fn new(table: &StatsTable, key: &str) -> Result<Self> {
        let stats = table
            .configurations
            .get(key)
            .cloned()
            .ok_or_else(|| CorrelatorError::MissingConfigurationKey(key.to_string()))?;

        debug!("Standardization key {} has {} feature(s)", key, stats.len());
        Ok(Self {
            key: key.to_string(),
            stats,
        })
    }

    pub fn from_config(config: &StandardizationConfig) -> Result<Self> {
        let table = StatsTable::load(&config.table_path)?;
        let standardizer = Self::new(&table, &config.configuration_key())?;
        info!(
            "✓ Standardization table loaded: {} (key {})",
            config.table_path, standardizer.key
        );
        Ok(standardizer)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Standardize a single feature. Features without statistics pass
    /// through unchanged.
    pub fn standardize_value(&self, feature: &str, value: f64) -> f64 {
        let Some(stats) = self.stats.get(&format!("{}_mean", feature)) else {
            return value;
        };
        if stats.scale == 0.0 {
            warn!("⚠️  Zero scale for feature {}, reporting 0", feature);
            return 0.0;
        }
        (yeo_johnson(value, stats.lambda) - stats.mean) / stats.scale
    }

    pub fn standardize(&self, raw: &MorphologyDescriptor) -> MorphologyDescriptor {
        raw.map_features(|name, value| self.standardize_value(name, value))
    }
}
