use crate::error::TrainingResult;
use crate::samples::CLASSES_FILE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which shard of a split dataset a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Val,
}

impl Split {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination layout of a split dataset.
///
/// ```text
/// <root>/images/train  <root>/labels/train
/// <root>/images/val    <root>/labels/val
/// <root>/classes.txt   (optional)
/// ```
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn images_dir(&self, split: Split) -> PathBuf {
        self.root.join("images").join(split.as_str())
    }

    #[must_use]
    pub fn labels_dir(&self, split: Split) -> PathBuf {
        self.root.join("labels").join(split.as_str())
    }

    #[must_use]
    pub fn classes_path(&self) -> PathBuf {
        self.root.join(CLASSES_FILE)
    }

    /// Create the four split directories. Existing directories are reused.
    pub fn ensure_dirs(&self) -> TrainingResult<()> {
        for split in [Split::Train, Split::Val] {
            std::fs::create_dir_all(self.images_dir(split))?;
            std::fs::create_dir_all(self.labels_dir(split))?;
        }
        Ok(())
    }
}
