//! Configuration for the `ir` binary.

pub mod cli_config;

pub use cli_config::{CliConfig, CliConfigError, CliConfigResult, SplitConfig, TrainConfig};
