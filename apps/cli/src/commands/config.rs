//! Config command implementation.

use crate::commands::types::ConfigCommand;
use anyhow::Result;
use colored::Colorize;
use iridium_core::CliConfig;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct ConfigLocation {
    scope: &'static str,
    path: PathBuf,
    exists: bool,
}

pub fn execute(command: ConfigCommand, config: &CliConfig) -> Result<()> {
    match command {
        ConfigCommand::Show { json } => show(config, json),
        ConfigCommand::Path { json } => show_paths(json),
    }
}

fn show(config: &CliConfig, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let content = config.to_toml()?;
    if content.trim().is_empty() {
        println!("{}", "# no settings; built-in defaults apply".dimmed());
    } else {
        print!("{content}");
    }
    Ok(())
}

fn show_paths(json_output: bool) -> Result<()> {
    let locations = [
        ConfigLocation { scope: "global", path: CliConfig::default_global_path(), exists: false },
        ConfigLocation { scope: "local", path: CliConfig::default_local_path(), exists: false },
    ]
    .map(|loc| ConfigLocation { exists: loc.path.exists(), ..loc });

    if json_output {
        println!("{}", serde_json::to_string_pretty(&locations)?);
        return Ok(());
    }

    for loc in &locations {
        let status = if loc.exists { "found".green() } else { "missing".dimmed() };
        println!("{:<8} {} ({})", loc.scope, loc.path.display(), status);
    }
    Ok(())
}
