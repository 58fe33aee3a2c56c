//! CLI configuration loading.

use iridium_core::CliConfig;

/// Load and merge CLI configuration.
///
/// Configuration precedence:
/// 1. CLI arguments (handled by clap)
/// 2. Local config file (./.iridiumrc)
/// 3. Global config file (~/.iridium/config.toml)
/// 4. Defaults
pub fn load_config() -> CliConfig {
    CliConfig::discover_and_load()
}
