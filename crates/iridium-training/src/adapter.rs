use crate::detection::{Detection, DetectionResult};
use crate::engine::{EngineObserver, EnginePredictions, ModelEngine, RawBox, TrainRequest};
use crate::error::TrainingResult;
use crate::job::TrainingParams;
use crate::progress::EventSink;
use crate::samples::list_images;
use image::DynamicImage;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Base weights used when a version tag is not recognized.
pub const DEFAULT_BASE_MODEL: &str = "yolov8n.pt";

/// Resolve a model family tag to its base weights.
#[must_use]
pub fn base_model_for_version(version: &str) -> &'static str {
    match version.trim() {
        "YOLOv8" => "yolov8n.pt",
        "YOLOv11" => "yolo11n.pt",
        "YOLOv5" => "yolov5nu.pt",
        _ => DEFAULT_BASE_MODEL,
    }
}

/// Integer percentage of finished epochs.
#[must_use]
pub fn epoch_percent(epoch: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    (u64::from(epoch) * 100 / u64::from(total)).min(100) as u8
}

/// Translates per-epoch engine callbacks into job progress.
///
/// Only increases are forwarded. A run that stops early is not bumped to 100.
struct EpochProgress<'a> {
    sink: &'a mut dyn EventSink,
    last: Option<u8>,
}

impl EngineObserver for EpochProgress<'_> {
    fn on_epoch_end(&mut self, epoch: u32, total: u32) {
        let percent = epoch_percent(epoch, total);
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        self.sink.progress(percent);
    }

    fn on_log(&mut self, message: &str) {
        self.sink.log(message.to_string());
    }
}

/// The narrow seam between the job runner and a detection engine.
pub struct ModelEngineAdapter {
    engine: Box<dyn ModelEngine>,
}

impl std::fmt::Debug for ModelEngineAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEngineAdapter").field("engine", &self.engine.id()).finish()
    }
}

impl ModelEngineAdapter {
    #[must_use]
    pub fn new(engine: Box<dyn ModelEngine>) -> Self {
        Self { engine }
    }

    #[must_use]
    pub fn train_request(params: &TrainingParams, data_config: &Path) -> TrainRequest {
        TrainRequest {
            base_model: base_model_for_version(&params.version).to_string(),
            data_config: data_config.to_path_buf(),
            epochs: params.epochs,
            batch: params.batch,
            imgsz: params.imgsz,
            device: params.device,
            workers: params.workers,
            optimizer: params.optimizer,
            patience: params.patience,
            lr0: params.lr0,
            cos_lr: params.cos_lr,
            rect: params.rect,
            cache: params.cache,
            augmentation: params.augmentation.clone(),
            project: params.project_name.clone(),
            name: params.model_name.clone(),
            export_onnx: params.export_onnx,
        }
    }

    /// Train against an already written dataset description.
    pub fn run_training(
        &mut self,
        params: &TrainingParams,
        data_config: &Path,
        sink: &mut dyn EventSink,
    ) -> TrainingResult<PathBuf> {
        let request = Self::train_request(params, data_config);
        sink.log(format!("Initializing {} model: {}...", params.version, request.base_model));
        sink.log(format!("Starting training for {} epochs...", request.epochs));

        let artifact_dir = {
            let mut observer = EpochProgress { sink: &mut *sink, last: None };
            self.engine.train(&request, &mut observer)?
        };

        sink.log("Training finished.".to_string());
        sink.log(format!("Results saved to {}", artifact_dir.display()));
        Ok(artifact_dir)
    }

    /// Detect objects in every readable image of `image_dir`.
    ///
    /// Images that fail to decode produce no result row.
    pub fn run_inference(
        &mut self,
        model_path: &Path,
        image_dir: &Path,
        grayscale: bool,
        sink: &mut dyn EventSink,
    ) -> TrainingResult<Vec<DetectionResult>> {
        let images = list_images(image_dir)?;
        sink.log(format!("Found {} image(s) in {}", images.len(), image_dir.display()));
        sink.progress(0);

        // Grayscale copies live here until the engine is done with them.
        let staging = if grayscale { Some(tempfile::tempdir()?) } else { None };

        let mut ready: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(images.len());
        let mut skipped = Vec::new();
        for (index, path) in images.into_iter().enumerate() {
            let decoded = match image::open(&path) {
                Ok(img) => img,
                Err(e) => {
                    warn!(image = %path.display(), error = %e, "skipping unreadable image");
                    skipped.push(path);
                    continue;
                }
            };

            match &staging {
                Some(dir) => {
                    let staged = dir.path().join(format!("{index:06}.png"));
                    to_gray_rgb(&decoded).save(&staged)?;
                    ready.push((path, staged));
                }
                None => ready.push((path.clone(), path)),
            }
        }

        if !skipped.is_empty() {
            sink.log(format!("Skipped {} unreadable image(s)", skipped.len()));
        }
        if ready.is_empty() {
            sink.progress(100);
            return Ok(Vec::new());
        }

        let engine_inputs: Vec<PathBuf> = ready.iter().map(|(_, staged)| staged.clone()).collect();
        let predictions = self.engine.predict(model_path, &engine_inputs)?;
        let results = resolve_predictions(&ready, predictions);

        debug!(images = results.len(), "inference finished");
        sink.progress(100);
        Ok(results)
    }
}

/// Luma conversion expanded back to three channels.
fn to_gray_rgb(img: &DynamicImage) -> image::RgbImage {
    DynamicImage::ImageLuma8(img.to_luma8()).to_rgb8()
}

fn resolve_predictions(ready: &[(PathBuf, PathBuf)], predictions: EnginePredictions) -> Vec<DetectionResult> {
    let EnginePredictions { class_names, images } = predictions;
    let mut by_input: HashMap<PathBuf, Vec<RawBox>> =
        images.into_iter().map(|p| (p.image_path, p.boxes)).collect();

    ready
        .iter()
        .filter_map(|(original, staged)| {
            let boxes = by_input.remove(staged)?;
            let detections = boxes.iter().map(|b| to_detection(b, class_names.as_ref())).collect();
            Some(DetectionResult { image_path: original.clone(), detections })
        })
        .collect()
}

fn to_detection(raw: &RawBox, class_names: Option<&BTreeMap<u32, String>>) -> Detection {
    let [x1, y1, x2, y2] = raw.xyxy;
    Detection {
        x1,
        y1,
        x2,
        y2,
        confidence: raw.confidence.clamp(0.0, 1.0),
        class_label: class_label(raw.class_id, class_names),
    }
}

/// Model class name when the table has the id, else the id itself.
#[must_use]
pub fn class_label(class_id: u32, class_names: Option<&BTreeMap<u32, String>>) -> String {
    class_names
        .and_then(|names| names.get(&class_id))
        .cloned()
        .unwrap_or_else(|| class_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        logs: Vec<String>,
        progress: Vec<u8>,
    }

    impl EventSink for RecordingSink {
        fn log(&mut self, message: String) {
            self.logs.push(message);
        }

        fn progress(&mut self, percent: u8) {
            self.progress.push(percent);
        }
    }

    #[test]
    fn test_version_lookup_with_fallback() {
        assert_eq!(base_model_for_version("YOLOv8"), "yolov8n.pt");
        assert_eq!(base_model_for_version("YOLOv11"), "yolo11n.pt");
        assert_eq!(base_model_for_version("YOLOv5"), "yolov5nu.pt");
        assert_eq!(base_model_for_version("YOLOv99"), DEFAULT_BASE_MODEL);
    }

    #[test]
    fn test_epoch_percent() {
        assert_eq!(epoch_percent(1, 3), 33);
        assert_eq!(epoch_percent(3, 3), 100);
        assert_eq!(epoch_percent(5, 3), 100);
        assert_eq!(epoch_percent(1, 0), 0);
    }

    #[test]
    fn test_epoch_progress_is_monotonic_and_not_forced() {
        let mut sink = RecordingSink::default();
        {
            let mut observer = EpochProgress { sink: &mut sink, last: None };
            for epoch in [1, 2, 2, 1, 3] {
                observer.on_epoch_end(epoch, 4);
            }
            observer.on_log("epoch log");
        }
        assert_eq!(sink.progress, vec![25, 50, 75]);
        assert_eq!(sink.logs, vec!["epoch log".to_string()]);
    }

    #[test]
    fn test_class_label_fallback() {
        let names: BTreeMap<u32, String> = [(0, "cat".to_string())].into_iter().collect();
        assert_eq!(class_label(0, Some(&names)), "cat");
        assert_eq!(class_label(4, Some(&names)), "4");
        assert_eq!(class_label(2, None), "2");
    }
}
