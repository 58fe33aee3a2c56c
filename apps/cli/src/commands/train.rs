//! Training command implementation.

use crate::commands::events;
use crate::commands::types::TrainArgs;
use anyhow::{Context, Result};
use colored::Colorize;
use iridium_core::CliConfig;
use iridium_training::{validate, Device, JobDescriptor, JobOutput, Optimizer, TrainingParams};

pub async fn execute(args: TrainArgs, config: &CliConfig) -> Result<()> {
    let json_output = args.json;
    let params = build_params(args, config);
    let descriptor = validate(JobDescriptor::Training(params.clone())).context("Invalid training job")?;

    if !json_output {
        println!();
        println!("{}", format!("Training {} ({})", params.model_name, params.version).bold().cyan());
        println!("  Train: {}", params.train_images.display().to_string().dimmed());
        println!("  Classes: {}", params.class_mapping().names().collect::<Vec<_>>().join(", ").dimmed());
        println!();
    }

    let runner = events::runner(config)?;
    let output = events::run_job(&runner, descriptor, json_output).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let JobOutput::Training { artifact_dir } = output {
        println!();
        println!("{}", "Training complete".bold().green());
        println!("  Artifacts: {}", artifact_dir.display().to_string().cyan());
        println!();
    }
    Ok(())
}

/// Built-in defaults, then the config `[train]` section, then flags.
fn build_params(args: TrainArgs, config: &CliConfig) -> TrainingParams {
    let mut params = config.training_defaults();

    if let Some(root) = args.dataset_root {
        params = params.with_dataset_root(&root);
    }
    if let Some(train_images) = args.train_images {
        params.train_images = train_images;
    }
    if let Some(val_images) = args.val_images {
        params.val_images = Some(val_images);
    }
    if let Some(classes) = args.classes {
        params.classes = classes;
    }
    if let Some(project) = args.project {
        params.project_name = project;
    }
    if let Some(name) = args.name {
        params.model_name = name;
    }
    if let Some(version) = args.model_version {
        params.version = version;
    }
    if let Some(epochs) = args.epochs {
        params.epochs = epochs;
    }
    if let Some(batch) = args.batch {
        params.batch = batch;
    }
    if let Some(imgsz) = args.imgsz {
        params.imgsz = imgsz;
    }
    if let Some(device) = args.device {
        params.device = Device::parse(&device);
    }
    if let Some(workers) = args.workers {
        params.workers = workers;
    }
    if let Some(optimizer) = args.optimizer {
        params.optimizer = Optimizer::parse(&optimizer);
    }
    if let Some(patience) = args.patience {
        params.patience = patience;
    }
    if let Some(lr0) = args.lr0 {
        params.lr0 = lr0;
    }
    if let Some(degrees) = args.degrees {
        params.augmentation.degrees = degrees;
    }
    if let Some(fliplr) = args.fliplr {
        params.augmentation.fliplr = fliplr;
    }
    if let Some(mosaic) = args.mosaic {
        params.augmentation.mosaic = mosaic;
    }
    if let Some(data_config) = args.data_config {
        params.data_config = data_config;
    }
    params.cos_lr |= args.cos_lr;
    params.rect |= args.rect;
    params.cache |= args.cache;
    params.export_onnx &= !args.no_onnx;
    params
}
