use crate::error::TrainingResult;
use crate::job::{Augmentation, Device, Optimizer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Fully resolved training request handed to an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    /// Base weights the run starts from, e.g. `yolov8n.pt`.
    pub base_model: String,
    /// Dataset description (`data.yaml`).
    pub data_config: PathBuf,
    pub epochs: u32,
    pub batch: u32,
    pub imgsz: u32,
    pub device: Device,
    pub workers: u32,
    pub optimizer: Optimizer,
    pub patience: u32,
    pub lr0: f64,
    pub cos_lr: bool,
    pub rect: bool,
    pub cache: bool,
    pub augmentation: Augmentation,
    pub project: String,
    pub name: String,
    pub export_onnx: bool,
}

/// One box as the engine reports it, before class-name resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBox {
    /// `[x1, y1, x2, y2]` in pixels.
    pub xyxy: [f32; 4],
    pub confidence: f32,
    pub class_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePrediction {
    pub image_path: PathBuf,
    pub boxes: Vec<RawBox>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnginePredictions {
    /// Class-name table embedded in the model, when it carries one.
    #[serde(default)]
    pub class_names: Option<BTreeMap<u32, String>>,
    pub images: Vec<ImagePrediction>,
}

/// Native signals an engine raises while training.
pub trait EngineObserver {
    fn on_epoch_end(&mut self, epoch: u32, total: u32);

    fn on_log(&mut self, message: &str);
}

/// External detection engine.
///
/// An instance is owned by exactly one job and used only on that job's
/// worker thread. Both calls block for their whole duration.
pub trait ModelEngine: Send {
    fn id(&self) -> &'static str;

    /// Train and return the directory holding the run's artifacts.
    fn train(&mut self, request: &TrainRequest, observer: &mut dyn EngineObserver) -> TrainingResult<PathBuf>;

    /// Run detection on already-readable images.
    fn predict(&mut self, model: &Path, images: &[PathBuf]) -> TrainingResult<EnginePredictions>;
}

/// Creates a fresh engine for every job.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> TrainingResult<Box<dyn ModelEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> TrainingResult<Box<dyn ModelEngine>> + Send + Sync,
{
    fn create(&self) -> TrainingResult<Box<dyn ModelEngine>> {
        self()
    }
}
