//! Iridium Core - concrete pieces behind the `ir` binary.
//!
//! This crate provides:
//! - CLI configuration file support (global and per-project TOML files)
//! - An Ultralytics-backed [`ModelEngine`](iridium_training::ModelEngine)
//!   that drives a Python bridge process
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use iridium_core::{config::CliConfig, engine::UltralyticsFactory};
//! use iridium_training::{JobRunner, RunnerOptions};
//!
//! let config = CliConfig::discover_and_load();
//! let factory = UltralyticsFactory::new(config.python_command());
//! let runner = JobRunner::new(Arc::new(factory), RunnerOptions::default());
//! ```

pub mod config;
pub mod engine;

pub use config::{CliConfig, CliConfigError, CliConfigResult, SplitConfig, TrainConfig};
pub use engine::{BridgeMessage, UltralyticsEngine, UltralyticsFactory};
