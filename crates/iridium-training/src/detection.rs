use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;

/// One predicted object: pixel-space box corners, confidence, class label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_label: String,
}

impl Detection {
    #[must_use]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// Inference output for a single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub image_path: PathBuf,
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    /// Plain-text detail block for a result viewer.
    #[must_use]
    pub fn summary(&self) -> String {
        let name = self
            .image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut out = format!("File: {name}\nDetections: {}\n", self.detections.len());
        for (i, det) in self.detections.iter().enumerate() {
            let _ = write!(
                out,
                "\n{}. {}\n   Conf: {:.2}\n   ROI: [{}, {}, {}, {}]\n",
                i + 1,
                det.class_label,
                det.confidence,
                det.x1 as i32,
                det.y1 as i32,
                det.x2 as i32,
                det.y2 as i32,
            );
        }
        out
    }
}
