//! Engine configuration.
//!
//! Configuration comes from defaults, an optional JSON file, and the
//! `AVARIG_DATA_DIR` environment variable, in that order.

use std::fs;
use std::path::{Path, PathBuf};

use avarig_data::bundled::{APPEARANCE_FILE_NAME, SKELETON_FILE_NAME};
use avarig_data::DataSource;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Environment variable naming a directory with the reference documents.
pub const DATA_DIR_ENV: &str = "AVARIG_DATA_DIR";

/// Default minimum joint offset in metres.
pub const DEFAULT_MIN_JOINT_OFFSET: f64 = 0.001;

/// Tunables of the custom-mesh corrective loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionSettings {
    /// Maximum number of corrective passes.
    pub iterations: usize,
    /// Tolerance in percent of the largest bounding-box extent.
    pub tolerance_percent: f64,
    /// Share of the error applied per pass, in percent.
    pub stepsize_percent: f64,
}

impl Default for CorrectionSettings {
    fn default() -> Self {
        Self {
            iterations: 10,
            tolerance_percent: 0.1,
            stepsize_percent: 100.0,
        }
    }
}

/// Which entries the joint offset store records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointStoreOptions {
    /// Record tail deltas as well as head deltas.
    pub include_tails: bool,
    /// Record IK bones.
    pub include_ik: bool,
}

impl Default for JointStoreOptions {
    fn default() -> Self {
        Self {
            include_tails: true,
            include_ik: false,
        }
    }
}

/// Configuration for the rig engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the reference documents. Bundled data is used
    /// when unset.
    pub data_dir: Option<PathBuf>,
    /// Skeleton file name inside `data_dir`.
    pub skeleton_file: String,
    /// Appearance file name inside `data_dir`.
    pub appearance_file: String,
    /// Corrective loop tunables.
    pub correction: CorrectionSettings,
    /// Joint offsets below this length are not stored.
    pub min_joint_offset: f64,
    /// Joint offset store options.
    pub joint_store: JointStoreOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            skeleton_file: SKELETON_FILE_NAME.to_string(),
            appearance_file: APPEARANCE_FILE_NAME.to_string(),
            correction: CorrectionSettings::default(),
            min_joint_offset: DEFAULT_MIN_JOINT_OFFSET,
            joint_store: JointStoreOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Loads a configuration file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|source| EngineError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies environment overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.data_dir = Some(PathBuf::from(dir));
            }
        }
        self
    }

    /// Sets the data directory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Sets the corrective loop tunables.
    pub fn correction(mut self, correction: CorrectionSettings) -> Self {
        self.correction = correction;
        self
    }

    /// Sets the number of corrective passes.
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.correction.iterations = iterations;
        self
    }

    /// Sets the minimum joint offset.
    pub fn min_joint_offset(mut self, metres: f64) -> Self {
        self.min_joint_offset = metres;
        self
    }

    /// Sets the joint store options.
    pub fn joint_store(mut self, options: JointStoreOptions) -> Self {
        self.joint_store = options;
        self
    }

    /// Where the reference documents come from.
    pub fn data_source(&self) -> DataSource {
        match &self.data_dir {
            Some(dir) => DataSource::Files {
                skeleton: dir.join(&self.skeleton_file),
                appearance: dir.join(&self.appearance_file),
            },
            None => DataSource::Bundled,
        }
    }
}
