//! Tracker configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `evotrack.ron` file (if exists)
//! 3. Environment variables prefixed with `EVOTRACK_`
//!
//! Example environment variable: `EVOTRACK_TRACKER__MODE=saveall`

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::params::ExperimentKind;
use crate::tracker::{ResultFileMode, TrackerMode};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackerConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub tracker: NestedConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

/// Where results and batch state live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory of per-run result logs
    pub results_dir: String,
    /// Completed-index file of the batch driver
    pub progress_file: String,
    /// Human-readable batch report
    pub report_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            results_dir: "results/data".to_string(),
            progress_file: "progress.ron".to_string(),
            report_file: "progress_report.txt".to_string(),
        }
    }
}

/// Per-run tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedConfig {
    pub mode: TrackerMode,
    /// Delete a run's previous result log instead of appending to it
    pub truncate_existing: bool,
    /// Overrides the experiment family's step budget
    #[serde(default)]
    pub max_frames: Option<u64>,
}

impl Default for NestedConfig {
    fn default() -> Self {
        Self {
            mode: TrackerMode::Standard,
            truncate_existing: false,
            max_frames: None,
        }
    }
}

impl NestedConfig {
    pub fn file_mode(&self) -> ResultFileMode {
        if self.truncate_existing {
            ResultFileMode::Truncate
        } else {
            ResultFileMode::Append
        }
    }
}

/// Batch driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub experiment: ExperimentKind,
    /// First index to run; earlier indices count as complete
    pub start_index: usize,
    /// Show the terminal progress bar
    pub progress_bar: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            experiment: ExperimentKind::Evogym,
            start_index: 0,
            progress_bar: true,
        }
    }
}

impl TrackerConfig {
    /// Load configuration with layered priority:
    /// 1. Compiled defaults (lowest priority)
    /// 2. `evotrack.ron` file (if exists)
    /// 3. Environment variables prefixed with `EVOTRACK_` (highest priority)
    pub fn load() -> Result<Self> {
        Self::load_from("evotrack")
    }

    /// Same as [`TrackerConfig::load`] with a different config file stem
    pub fn load_from(file_stem: &str) -> Result<Self> {
        let builder = Config::builder()
            // Layer 1: Compiled defaults
            .set_default("paths.results_dir", "results/data")?
            .set_default("paths.progress_file", "progress.ron")?
            .set_default("paths.report_file", "progress_report.txt")?
            .set_default("tracker.mode", "standard")?
            .set_default("tracker.truncate_existing", false)?
            .set_default("batch.experiment", "evogym")?
            .set_default("batch.start_index", 0_i64)?
            .set_default("batch.progress_bar", true)?
            // Layer 2: Config file (optional, won't error if missing)
            .add_source(
                File::with_name(file_stem)
                    .format(config::FileFormat::Ron)
                    .required(false),
            )
            // Layer 3: Environment variables (EVOTRACK_PATHS__RESULTS_DIR, etc.)
            .add_source(
                Environment::with_prefix("EVOTRACK")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
