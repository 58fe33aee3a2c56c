//! Inference command implementation.

use crate::commands::events;
use crate::commands::types::PredictArgs;
use anyhow::{Context, Result};
use colored::Colorize;
use iridium_core::CliConfig;
use iridium_training::{validate, DetectionResult, InferenceParams, JobDescriptor, JobOutput};

pub async fn execute(args: PredictArgs, config: &CliConfig) -> Result<()> {
    let params = InferenceParams { model_path: args.model, image_dir: args.images, grayscale: args.grayscale };
    let descriptor = validate(JobDescriptor::Inference(params)).context("Invalid inference job")?;

    let runner = events::runner(config)?;
    let output = events::run_job(&runner, descriptor, args.json).await?;
    let results = match output {
        JobOutput::Inference { results } => results,
        JobOutput::Training { .. } => anyhow::bail!("Unexpected training output from an inference job"),
    };

    if let Some(path) = &args.output {
        write_results(path, &results)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Results ({})", results.len()).bold().cyan());
    for result in &results {
        println!();
        print!("{}", result.summary());
    }
    if let Some(path) = &args.output {
        println!();
        println!("  Saved: {}", path.display().to_string().dimmed());
    }
    println!();
    Ok(())
}

fn write_results(path: &std::path::Path, results: &[DetectionResult]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(results)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
