//! Dataset split command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use iridium_training::{split_dataset, SplitEvent, SplitOptions};
use std::path::Path;

pub fn execute(source: &Path, destination: &Path, options: &SplitOptions, json_output: bool) -> Result<()> {
    let progress = |event: SplitEvent| {
        if json_output {
            return;
        }
        match event {
            SplitEvent::NoImages { .. } => println!("  {}", event.message().yellow()),
            SplitEvent::Finished { .. } => println!("  {}", event.message().green()),
            _ => println!("  {}", event.message().dimmed()),
        }
    };

    let report = split_dataset(source, destination, options, &progress)
        .with_context(|| format!("Failed to split dataset from {}", source.display()))?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("{}", "Split complete".bold().green());
    println!("  Train:  {}", report.train.to_string().cyan());
    println!("  Val:    {}", report.val.to_string().cyan());
    println!("  Labels: {}", report.labels_copied.to_string().cyan());
    println!("  Root:   {}", report.destination.display().to_string().dimmed());
    println!();
    Ok(())
}
