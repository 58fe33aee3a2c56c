//! CLI configuration file support.
//!
//! Settings are read from a global file (`~/.iridium/config.toml`) and a
//! project-local file (`./.iridiumrc`); local values override global ones.

use iridium_training::{Device, SplitOptions, TrainingParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Interpreter used for the engine bridge when none is configured.
pub const DEFAULT_PYTHON: &str = "python3";

/// CLI configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub log_level: Option<String>,

    /// Python interpreter that runs the engine bridge
    #[serde(default)]
    pub python: Option<String>,

    /// Dataset split defaults
    #[serde(default)]
    pub split: SplitConfig,

    /// Training defaults
    #[serde(default)]
    pub train: TrainConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of images placed in the train shard
    #[serde(default)]
    pub ratio: Option<f64>,

    /// Shuffle seed; unset means a fresh shuffle every run
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub workers: Option<u32>,
    #[serde(default)]
    pub epochs: Option<u32>,
    #[serde(default)]
    pub batch: Option<u32>,
    #[serde(default)]
    pub imgsz: Option<u32>,
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum CliConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read or write a configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),
}

/// Result type for configuration operations.
pub type CliConfigResult<T> = std::result::Result<T, CliConfigError>;

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> CliConfigResult<Self> {
        if !path.exists() {
            return Err(CliConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| CliConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content).map_err(|e| CliConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> CliConfigResult<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CliConfigError::ReadError(format!("Failed to create directory: {e}")))?;
        }

        std::fs::write(path, content).map_err(|e| CliConfigError::ReadError(format!("Failed to write file: {e}")))
    }

    pub fn to_toml(&self) -> CliConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| CliConfigError::ParseError(format!("Failed to serialize: {e}")))
    }

    /// Get default global configuration file path.
    #[must_use]
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map_or_else(|_| PathBuf::from("."), PathBuf::from)
            .join(".iridium")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    #[must_use]
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".iridiumrc")
    }

    /// Discover and load configuration files.
    ///
    /// Loads configuration from:
    /// 1. Global config (~/.iridium/config.toml)
    /// 2. Local config (./.iridiumrc)
    ///
    /// Local config overrides global config.
    #[must_use]
    pub fn discover_and_load() -> Self {
        Self::load_layered(&Self::default_global_path(), &Self::default_local_path())
    }

    /// Merge `global` then `local` over the defaults. Missing files are skipped.
    #[must_use]
    pub fn load_layered(global: &Path, local: &Path) -> Self {
        let mut config = Self::default();
        for path in [global, local] {
            match Self::load_from_file(path) {
                Ok(layer) => config.merge(&layer),
                Err(CliConfigError::NotFound(_)) => {}
                Err(e) => debug!(path = %path.display(), error = %e, "ignoring unreadable config"),
            }
        }
        config
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &Self) {
        if let Some(ref log_level) = other.log_level {
            self.log_level = Some(log_level.clone());
        }
        if let Some(ref python) = other.python {
            self.python = Some(python.clone());
        }
        self.split.ratio = other.split.ratio.or(self.split.ratio);
        self.split.seed = other.split.seed.or(self.split.seed);

        let train = &other.train;
        if let Some(ref device) = train.device {
            self.train.device = Some(device.clone());
        }
        self.train.workers = train.workers.or(self.train.workers);
        self.train.epochs = train.epochs.or(self.train.epochs);
        self.train.batch = train.batch.or(self.train.batch);
        self.train.imgsz = train.imgsz.or(self.train.imgsz);
    }

    #[must_use]
    pub fn python_command(&self) -> String {
        self.python.clone().unwrap_or_else(|| DEFAULT_PYTHON.to_string())
    }

    /// Split options with `ratio`/`seed` overriding the configured values.
    #[must_use]
    pub fn split_options(&self, ratio: Option<f64>, seed: Option<u64>) -> SplitOptions {
        let defaults = SplitOptions::default();
        SplitOptions {
            ratio: ratio.or(self.split.ratio).unwrap_or(defaults.ratio),
            seed: seed.or(self.split.seed),
        }
    }

    /// Built-in training defaults with the `[train]` section applied.
    #[must_use]
    pub fn training_defaults(&self) -> TrainingParams {
        let mut params = TrainingParams::default();
        if let Some(ref device) = self.train.device {
            params.device = Device::parse(device);
        }
        if let Some(workers) = self.train.workers {
            params.workers = workers;
        }
        if let Some(epochs) = self.train.epochs {
            params.epochs = epochs;
        }
        if let Some(batch) = self.train.batch {
            params.batch = batch;
        }
        if let Some(imgsz) = self.train.imgsz {
            params.imgsz = imgsz;
        }
        params
    }
}
