//! Iridium Training
//!
//! Backend-agnostic primitives for a detection training workflow:
//! - Splitting a labelled image folder into a train/val layout
//! - Describing and validating training and inference jobs
//! - Running jobs on worker threads with a per-job event stream
//! - Adapting an external detection engine (`ModelEngine`) to that stream

pub mod adapter;
pub mod description;
pub mod detection;
pub mod engine;
pub mod error;
pub mod job;
pub mod layout;
pub mod progress;
pub mod runner;
pub mod samples;
pub mod split;

pub use adapter::{base_model_for_version, class_label, epoch_percent, ModelEngineAdapter, DEFAULT_BASE_MODEL};
pub use description::{create_dataset_description, ClassMapping, DatasetDescription};
pub use detection::{Detection, DetectionResult};
pub use engine::{EngineFactory, EngineObserver, EnginePredictions, ImagePrediction, ModelEngine, RawBox, TrainRequest};
pub use error::{TrainingError, TrainingResult};
pub use job::{
    validate, Augmentation, Device, InferenceParams, JobDescriptor, JobId, JobKind, Optimizer, TrainingParams,
    ValidatedDescriptor,
};
pub use layout::{DatasetLayout, Split};
pub use progress::{
    ChannelSink, ErrorInfo, EventSink, JobEvent, JobOutput, SplitEvent, SplitProgress, TracingSplitProgress,
};
pub use runner::{JobEvents, JobHandle, JobRunner, JobState, RunnerOptions};
pub use samples::{discover_samples, is_image_file, list_images, RawSample, IMAGE_EXTENSIONS};
pub use split::{assign, split_dataset, train_count, SplitAssignment, SplitOptions, SplitReport};
