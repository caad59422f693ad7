// src/config.rs

use crate::types::DetectionRole;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub classes: ClassMap,
    pub trajectory: TrajectoryConfig,
    pub standardization: StandardizationConfig,
    pub manual: ManualConfig,
    pub run: RunConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum frame gap between two accepted collisions
    pub cooldown_frames: u64,
    pub fps: u32,
    /// Sustained target+tool co-presence required before firing
    pub dwell_seconds: f64,
    /// Tunable: raw mask column below which the needle is assumed to enter
    /// from the left edge, so its tip is the rightmost mask point
    pub needle_tip_edge_px: usize,
    /// Anchor box reaches this far past the tip and above it
    pub anchor_margin_px: f64,
    /// Anchor box extent back along the shaft and below the tip
    pub anchor_size_px: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cooldown_frames: 30,
            fps: 30,
            dwell_seconds: 3.0,
            needle_tip_edge_px: 50,
            anchor_margin_px: 5.0,
            anchor_size_px: 30.0,
        }
    }
}

impl EngineConfig {
    /// Dwell threshold in frames (3 s at 30 fps = 90).
    pub fn save_frame_delay(&self) -> u64 {
        (self.dwell_seconds * self.fps as f64).round() as u64
    }
}

/// Detector class ids per role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassMap {
    pub motile: Vec<u32>,
    pub needle: Vec<u32>,
    pub target: Vec<u32>,
    pub target_tool: Vec<u32>,
}

impl Default for ClassMap {
    fn default() -> Self {
        Self {
            motile: vec![0],
            needle: vec![1],
            target: vec![4],
            target_tool: vec![5],
        }
    }
}

impl ClassMap {
    pub fn role_of(&self, class_id: u32) -> DetectionRole {
        if self.motile.contains(&class_id) {
            DetectionRole::Motile
        } else if self.needle.contains(&class_id) {
            DetectionRole::Needle
        } else if self.target.contains(&class_id) {
            DetectionRole::Target
        } else if self.target_tool.contains(&class_id) {
            DetectionRole::TargetTool
        } else {
            DetectionRole::Other
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Frame width the trajectory positions were recorded at
    pub reference_width: u32,
    /// Reconciled points are kept at least this far from every frame edge
    pub edge_margin_px: u32,
    pub max_match_distance_px: f64,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            reference_width: 640,
            edge_margin_px: 10,
            max_match_distance_px: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardizationConfig {
    pub table_path: String,
    pub objective: String,
    pub resolution: [f64; 2],
    pub percentile: String,
}

impl Default for StandardizationConfig {
    fn default() -> Self {
        Self {
            table_path: "data/morphology_features_stats.json".to_string(),
            objective: "20X".to_string(),
            resolution: [640.0, 480.0],
            percentile: "7%".to_string(),
        }
    }
}

impl StandardizationConfig {
    /// Acquisition-configuration key, e.g. `('20X', '[640.0, 480.0]', '7%')`.
    pub fn configuration_key(&self) -> String {
        format!(
            "('{}', '[{:.1}, {:.1}]', '{}')",
            self.objective, self.resolution[0], self.resolution[1], self.percentile
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualConfig {
    pub enabled: bool,
    pub ids: Vec<u64>,
    pub interactive: bool,
    pub poll_interval_ms: u64,
}

impl Default for ManualConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ids: Vec::new(),
            interactive: false,
            poll_interval_ms: 50,
        }
    }
}

impl ManualConfig {
    /// Manual correlation needs both the switch and at least one identity.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.ids.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub input_dir: String,
    pub output_dir: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_dir: "data/runs".to_string(),
            output_dir: "output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise start from defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `ICSI_INPUT_DIR`, `ICSI_OUTPUT_DIR` and `ICSI_MANUAL_IDS`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var("ICSI_INPUT_DIR").ok(),
            std::env::var("ICSI_OUTPUT_DIR").ok(),
            std::env::var("ICSI_MANUAL_IDS").ok(),
        )
    }

    fn apply_overrides(
        &mut self,
        input_dir: Option<String>,
        output_dir: Option<String>,
        manual_ids: Option<String>,
    ) -> Result<()> {
        if let Some(dir) = input_dir {
            self.run.input_dir = dir;
        }
        if let Some(dir) = output_dir {
            self.run.output_dir = dir;
        }
        if let Some(ids) = manual_ids {
            self.manual.ids = parse_id_list(&ids)?;
            self.manual.enabled = !self.manual.ids.is_empty();
        }
        Ok(())
    }
}

/// Parse `"462, 482"` into `[462, 482]`. Empty entries are ignored.
pub fn parse_id_list(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .with_context(|| format!("Invalid identity '{}' in manual id list", s))
        })
        .collect()
}
