use crate::description::ClassMapping;
use crate::error::{TrainingError, TrainingResult};
use crate::layout::{DatasetLayout, Split};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Identifier for a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Training,
    Inference,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Training => f.write_str("training"),
            Self::Inference => f.write_str("inference"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Auto,
    Cpu,
    Cuda,
    Mps,
}

impl Device {
    /// Parse a device label. Unrecognized labels select `Auto`.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "cpu" => Self::Cpu,
            "cuda" | "gpu" | "gpu (cuda)" | "0" => Self::Cuda,
            "mps" | "gpu (mps)" => Self::Mps,
            _ => Self::Auto,
        }
    }

    /// Device token understood by the engine; `None` lets it choose.
    #[must_use]
    pub fn engine_token(self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            Self::Cpu => Some("cpu"),
            Self::Cuda => Some("0"),
            Self::Mps => Some("mps"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Optimizer {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "SGD")]
    Sgd,
    Adam,
    AdamW,
    #[serde(rename = "RMSProp")]
    RmsProp,
}

impl Optimizer {
    /// Parse an optimizer name. Unrecognized names select `Auto`.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "sgd" => Self::Sgd,
            "adam" => Self::Adam,
            "adamw" => Self::AdamW,
            "rmsprop" => Self::RmsProp,
            _ => Self::Auto,
        }
    }

    #[must_use]
    pub fn engine_token(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Sgd => "SGD",
            Self::Adam => "Adam",
            Self::AdamW => "AdamW",
            Self::RmsProp => "RMSProp",
        }
    }
}

/// Augmentation knobs forwarded untouched to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Augmentation {
    pub degrees: f64,
    pub fliplr: f64,
    pub mosaic: f64,
}

impl Default for Augmentation {
    fn default() -> Self {
        Self { degrees: 0.0, fliplr: 0.5, mosaic: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    pub project_name: String,
    pub model_name: String,
    /// Model family tag, e.g. `YOLOv8`.
    pub version: String,
    pub train_images: PathBuf,
    pub train_labels: Option<PathBuf>,
    pub val_images: Option<PathBuf>,
    pub val_labels: Option<PathBuf>,
    /// Comma-separated class names.
    pub classes: String,
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
    /// Where the dataset description is written before training.
    pub data_config: PathBuf,
    pub export_onnx: bool,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            project_name: "MyYOLOProject".to_string(),
            model_name: "yolov8n".to_string(),
            version: "YOLOv8".to_string(),
            train_images: PathBuf::new(),
            train_labels: None,
            val_images: None,
            val_labels: None,
            classes: String::new(),
            epochs: 100,
            batch: 16,
            imgsz: 640,
            device: Device::Auto,
            workers: 8,
            optimizer: Optimizer::Auto,
            patience: 50,
            lr0: 0.01,
            cos_lr: false,
            rect: false,
            cache: false,
            augmentation: Augmentation::default(),
            data_config: PathBuf::from("data.yaml"),
            export_onnx: true,
        }
    }
}

impl TrainingParams {
    /// Point the image and label paths at a split dataset root.
    #[must_use]
    pub fn with_dataset_root(mut self, root: &Path) -> Self {
        let layout = DatasetLayout::new(root.to_path_buf());
        self.train_images = layout.images_dir(Split::Train);
        self.train_labels = Some(layout.labels_dir(Split::Train));
        self.val_images = Some(layout.images_dir(Split::Val));
        self.val_labels = Some(layout.labels_dir(Split::Val));
        self
    }

    #[must_use]
    pub fn class_mapping(&self) -> ClassMapping {
        ClassMapping::parse(&self.classes)
    }

    fn validate(&self) -> TrainingResult<()> {
        if self.class_mapping().is_empty() {
            return Err(TrainingError::Validation("at least one class name is required".to_string()));
        }
        if self.train_images.as_os_str().is_empty() {
            return Err(TrainingError::Validation("train_images is required".to_string()));
        }
        if !self.train_images.exists() {
            return Err(TrainingError::not_found(&self.train_images));
        }
        if self.project_name.trim().is_empty() {
            return Err(TrainingError::Validation("project_name is required".to_string()));
        }
        if self.model_name.trim().is_empty() {
            return Err(TrainingError::Validation("model_name is required".to_string()));
        }
        if self.epochs == 0 {
            return Err(TrainingError::Validation("epochs must be >= 1".to_string()));
        }
        if self.batch == 0 {
            return Err(TrainingError::Validation("batch must be >= 1".to_string()));
        }
        if self.imgsz < 32 {
            return Err(TrainingError::Validation("imgsz must be >= 32".to_string()));
        }
        if !self.lr0.is_finite() || self.lr0 <= 0.0 {
            return Err(TrainingError::Validation("lr0 must be > 0".to_string()));
        }
        for (name, p) in [("fliplr", self.augmentation.fliplr), ("mosaic", self.augmentation.mosaic)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(TrainingError::Validation(format!("{name} must be within [0, 1]")));
            }
        }
        if !(-180.0..=180.0).contains(&self.augmentation.degrees) {
            return Err(TrainingError::Validation("degrees must be within [-180, 180]".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceParams {
    pub model_path: PathBuf,
    pub image_dir: PathBuf,
    #[serde(default)]
    pub grayscale: bool,
}

impl InferenceParams {
    fn validate(&self) -> TrainingResult<()> {
        if !self.model_path.is_file() {
            return Err(TrainingError::not_found(&self.model_path));
        }
        if !self.image_dir.is_dir() {
            return Err(TrainingError::not_found(&self.image_dir));
        }
        Ok(())
    }
}

/// Parameters of one run, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobDescriptor {
    Training(TrainingParams),
    Inference(InferenceParams),
}

impl JobDescriptor {
    #[must_use]
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Training(_) => JobKind::Training,
            Self::Inference(_) => JobKind::Inference,
        }
    }
}

/// A descriptor that passed [`validate`]. Only constructible through it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDescriptor(JobDescriptor);

impl ValidatedDescriptor {
    #[must_use]
    pub fn kind(&self) -> JobKind {
        self.0.kind()
    }

    #[must_use]
    pub fn descriptor(&self) -> &JobDescriptor {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> JobDescriptor {
        self.0
    }
}

pub fn validate(descriptor: JobDescriptor) -> TrainingResult<ValidatedDescriptor> {
    match &descriptor {
        JobDescriptor::Training(params) => params.validate()?,
        JobDescriptor::Inference(params) => params.validate()?,
    }
    Ok(ValidatedDescriptor(descriptor))
}
