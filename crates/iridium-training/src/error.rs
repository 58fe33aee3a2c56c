use crate::job::JobKind;
use std::path::PathBuf;
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid job descriptor: {0}")]
    Validation(String),

    #[error("invalid split options: {0}")]
    InvalidSpec(String),

    #[error("a {0} job is already running")]
    Busy(JobKind),

    #[error("engine error: {0}")]
    Engine(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrainingError {
    /// Error for a path that is expected to exist.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
    }
}
