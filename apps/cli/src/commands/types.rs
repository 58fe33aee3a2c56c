//! Command type definitions shared between main.rs and the command modules.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Show the merged configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration file locations
    Path {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Training hyperparameters. Unset values fall back to config, then built-in defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct TrainArgs {
    /// Comma-separated class names, in index order (e.g. "cat, dog")
    #[arg(long)]
    pub classes: Option<String>,

    /// Split dataset root; sets train/val image and label folders
    #[arg(long)]
    pub dataset_root: Option<PathBuf>,

    /// Train images folder (overrides --dataset-root)
    #[arg(long)]
    pub train_images: Option<PathBuf>,

    /// Validation images folder (defaults to the train images)
    #[arg(long)]
    pub val_images: Option<PathBuf>,

    /// Project folder for run artifacts
    #[arg(long)]
    pub project: Option<String>,

    /// Run name inside the project folder
    #[arg(long)]
    pub name: Option<String>,

    /// Model family (YOLOv8, YOLOv11, YOLOv5)
    #[arg(long = "model-version")]
    pub model_version: Option<String>,

    #[arg(long)]
    pub epochs: Option<u32>,

    #[arg(long)]
    pub batch: Option<u32>,

    /// Input image size
    #[arg(long)]
    pub imgsz: Option<u32>,

    /// Device (auto, cpu, cuda, mps)
    #[arg(long)]
    pub device: Option<String>,

    /// Data loader workers
    #[arg(long)]
    pub workers: Option<u32>,

    /// Optimizer (auto, SGD, Adam, AdamW, RMSProp)
    #[arg(long)]
    pub optimizer: Option<String>,

    /// Early-stopping patience in epochs
    #[arg(long)]
    pub patience: Option<u32>,

    /// Initial learning rate
    #[arg(long)]
    pub lr0: Option<f64>,

    /// Cosine learning-rate schedule
    #[arg(long)]
    pub cos_lr: bool,

    /// Rectangular batches
    #[arg(long)]
    pub rect: bool,

    /// Cache images in memory
    #[arg(long)]
    pub cache: bool,

    /// Rotation augmentation in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub degrees: Option<f64>,

    /// Horizontal flip probability
    #[arg(long)]
    pub fliplr: Option<f64>,

    /// Mosaic probability
    #[arg(long)]
    pub mosaic: Option<f64>,

    /// Where to write the dataset description
    #[arg(long)]
    pub data_config: Option<PathBuf>,

    /// Skip the ONNX export after training
    #[arg(long)]
    pub no_onnx: bool,

    /// Output the final result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Trained weights (.pt or .onnx)
    #[arg(long)]
    pub model: PathBuf,

    /// Folder of images to run detection on
    #[arg(long)]
    pub images: PathBuf,

    /// Feed the detector grayscale copies of the images
    #[arg(long)]
    pub grayscale: bool,

    /// Also write the results as pretty JSON to this file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output the results as JSON
    #[arg(long)]
    pub json: bool,
}
