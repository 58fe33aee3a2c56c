//! Iridium CLI - dataset preparation, training and inference for YOLO detectors
//!
//! This CLI provides an `ir` command that splits labelled image folders,
//! launches training runs and runs detection over image folders.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::types::{ConfigCommand, PredictArgs, TrainArgs};

/// Iridium CLI - YOLO dataset and training workflow
#[derive(Parser, Debug)]
#[command(
    name = "ir",
    author,
    version,
    about = "Iridium - YOLO dataset preparation, training and inference",
    long_about = "Iridium (ir) splits labelled image folders into train/val layouts,\ndrives Ultralytics YOLO training runs and runs detection over image folders."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a labelled image folder into train/val shards
    ///
    /// Images are discovered recursively under SOURCE. Each image's sibling
    /// `.txt` label follows it into the same shard, and `classes.txt` is copied
    /// to the dataset root.
    Split {
        /// Folder holding images and their labels
        source: PathBuf,

        /// Output folder
        output: PathBuf,

        /// Dataset name; the dataset is created at OUTPUT/NAME
        #[arg(long)]
        name: Option<String>,

        /// Fraction of images placed in the train shard
        #[arg(long)]
        ratio: Option<f64>,

        /// Shuffle seed for a reproducible split
        #[arg(long)]
        seed: Option<u64>,

        /// Output the split report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Train a detector on a split dataset
    Train(TrainArgs),

    /// Run detection over a folder of images
    Predict(PredictArgs),

    /// Inspect CLI configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn parse_level(level: &str) -> Level {
    match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cli_config = config::load_config();

    // Initialize tracing
    let level = args.log_level.as_deref().or(cli_config.log_level.as_deref()).map_or(Level::WARN, parse_level);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Split { source, output, name, ratio, seed, json } => {
            let destination = name.map_or_else(|| output.clone(), |name| output.join(name));
            let options = cli_config.split_options(ratio, seed);
            commands::split::execute(&source, &destination, &options, json)
        }
        Command::Train(train_args) => commands::train::execute(train_args, &cli_config).await,
        Command::Predict(predict_args) => commands::predict::execute(predict_args, &cli_config).await,
        Command::Config(command) => commands::config::execute(command, &cli_config),
    }
}
