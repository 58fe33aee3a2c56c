//! Renders a job's event stream to the terminal.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use iridium_core::{CliConfig, UltralyticsFactory};
use iridium_training::{JobEvent, JobOutput, JobRunner, RunnerOptions, ValidatedDescriptor};
use std::sync::Arc;

/// Runner backed by the Ultralytics bridge, rooted at the current directory.
pub fn runner(config: &CliConfig) -> Result<JobRunner> {
    let work_dir = std::env::current_dir().context("Failed to resolve the current directory")?;
    let factory = UltralyticsFactory::new(config.python_command());
    Ok(JobRunner::new(Arc::new(factory), RunnerOptions { work_dir }))
}

/// Submit `descriptor` and follow its events until the terminal one.
///
/// Log and progress lines are printed unless `quiet`.
pub async fn run_job(runner: &JobRunner, descriptor: ValidatedDescriptor, quiet: bool) -> Result<JobOutput> {
    let (handle, mut events) = runner.submit(descriptor)?;
    tracing::debug!(job_id = %handle.id(), kind = %handle.kind(), "following job");

    let mut outcome = None;
    while let Some(event) = events.recv().await {
        match event {
            JobEvent::Log { message } => {
                if !quiet {
                    println!("  {}", message.dimmed());
                }
            }
            JobEvent::Progress { percent } => {
                if !quiet {
                    println!("  {} {}%", "progress".cyan(), percent);
                }
            }
            JobEvent::Result { output } => {
                outcome = Some(Ok(output));
                break;
            }
            JobEvent::Error { error } => {
                outcome = Some(Err(error));
                break;
            }
        }
    }

    let state = tokio::task::spawn_blocking(move || handle.wait()).await?;
    match outcome {
        Some(Ok(output)) => Ok(output),
        Some(Err(error)) => bail!("Job failed: {error}"),
        None => bail!("Job ended without a result (state: {state:?})"),
    }
}
