//! Integration tests for the job runner and the engine adapter.
//!
//! A scripted engine stands in for the real detector so that busy rejection,
//! terminal-event rules, failure capture and inference post-processing can be
//! observed deterministically.

use iridium_training::{
    validate, DatasetDescription, EngineFactory, EngineObserver, EnginePredictions, ImagePrediction,
    InferenceParams, JobDescriptor, JobEvent, JobKind, JobOutput, JobRunner, JobState, ModelEngine, RawBox,
    RunnerOptions, TrainRequest, TrainingError, TrainingParams, TrainingResult,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use tempfile::TempDir;

/// Blocks an engine call until the test opens it.
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }

    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Panic,
}

struct ScriptedEngine {
    behavior: Behavior,
    gate: Option<Arc<Gate>>,
    epochs_reported: Vec<u32>,
    class_names: Option<BTreeMap<u32, String>>,
    seen: Arc<Mutex<Vec<PathBuf>>>,
    requests: Arc<Mutex<Vec<TrainRequest>>>,
}

impl ModelEngine for ScriptedEngine {
    fn id(&self) -> &'static str {
        "scripted"
    }

    fn train(&mut self, request: &TrainRequest, observer: &mut dyn EngineObserver) -> TrainingResult<PathBuf> {
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        self.requests.lock().unwrap().push(request.clone());
        match self.behavior {
            Behavior::Succeed => {
                for epoch in &self.epochs_reported {
                    observer.on_log(&format!("epoch {epoch}"));
                    observer.on_epoch_end(*epoch, request.epochs);
                }
                Ok(PathBuf::from(&request.project).join(&request.name))
            }
            Behavior::Fail => Err(TrainingError::Engine("CUDA out of memory".to_string())),
            Behavior::Panic => panic!("native crash"),
        }
    }

    fn predict(&mut self, _model: &Path, images: &[PathBuf]) -> TrainingResult<EnginePredictions> {
        self.seen.lock().unwrap().extend(images.iter().cloned());
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        let images = images
            .iter()
            .enumerate()
            .map(|(i, path)| ImagePrediction {
                image_path: path.clone(),
                boxes: vec![RawBox { xyxy: [1.0, 2.0, 30.0, 40.0], confidence: 1.3, class_id: i as u32 * 7 }],
            })
            .collect();
        Ok(EnginePredictions { class_names: self.class_names.clone(), images })
    }
}

struct ScriptedFactory {
    behavior: Behavior,
    gate: Option<Arc<Gate>>,
    epochs_reported: Vec<u32>,
    class_names: Option<BTreeMap<u32, String>>,
    seen: Arc<Mutex<Vec<PathBuf>>>,
    requests: Arc<Mutex<Vec<TrainRequest>>>,
    created: Mutex<usize>,
}

impl ScriptedFactory {
    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            gate: None,
            epochs_reported: vec![1, 2, 3, 4],
            class_names: None,
            seen: Arc::default(),
            requests: Arc::default(),
            created: Mutex::new(0),
        }
    }
}

impl EngineFactory for ScriptedFactory {
    fn create(&self) -> TrainingResult<Box<dyn ModelEngine>> {
        *self.created.lock().unwrap() += 1;
        Ok(Box::new(ScriptedEngine {
            behavior: self.behavior,
            gate: self.gate.clone(),
            epochs_reported: self.epochs_reported.clone(),
            class_names: self.class_names.clone(),
            seen: Arc::clone(&self.seen),
            requests: Arc::clone(&self.requests),
        }))
    }
}

fn runner(factory: Arc<ScriptedFactory>, work_dir: &Path) -> JobRunner {
    JobRunner::new(factory, RunnerOptions { work_dir: work_dir.to_path_buf() })
}

fn training_params(root: &Path) -> TrainingParams {
    let params = TrainingParams {
        classes: "cat, dog, person".to_string(),
        epochs: 4,
        ..Default::default()
    }
    .with_dataset_root(&root.join("dataset"));
    std::fs::create_dir_all(&params.train_images).unwrap();
    std::fs::create_dir_all(params.val_images.as_ref().unwrap()).unwrap();
    params
}

fn write_png(path: &Path, rgb: [u8; 3]) {
    image::RgbImage::from_pixel(4, 3, image::Rgb(rgb)).save(path).unwrap();
}

fn assert_single_terminal_last(events: &[JobEvent]) {
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1, "expected exactly one terminal event: {events:?}");
    assert!(events.last().unwrap().is_terminal());
}

#[test]
fn test_training_job_completes_with_ordered_events() {
    let temp = TempDir::new().unwrap();
    let factory = Arc::new(ScriptedFactory::new(Behavior::Succeed));
    let runner = runner(Arc::clone(&factory), temp.path());

    let descriptor = validate(JobDescriptor::Training(training_params(temp.path()))).unwrap();
    let (handle, events) = runner.submit(descriptor).unwrap();
    assert_eq!(handle.kind(), JobKind::Training);

    let events = events.collect_blocking();
    assert_single_terminal_last(&events);
    assert_eq!(handle.wait(), JobState::Completed);

    let progress: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress { percent } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![25, 50, 75, 100]);

    match events.last().unwrap() {
        JobEvent::Result { output: JobOutput::Training { artifact_dir } } => {
            assert_eq!(artifact_dir, &PathBuf::from("MyYOLOProject").join("yolov8n"));
        }
        other => panic!("unexpected terminal event: {other:?}"),
    }

    let description = DatasetDescription::read(&temp.path().join("data.yaml")).unwrap();
    assert_eq!(description.nc, 3);
    assert_eq!(description.names.names().collect::<Vec<_>>(), vec!["cat", "dog", "person"]);
    assert!(description.val.ends_with("images/val"));

    let requests = factory.requests.lock().unwrap();
    assert_eq!(requests[0].base_model, "yolov8n.pt");
    assert_eq!(requests[0].data_config, std::path::absolute(temp.path().join("data.yaml")).unwrap());
}

#[test]
fn test_second_submission_of_same_kind_is_busy() {
    let temp = TempDir::new().unwrap();
    let gate = Arc::new(Gate::default());
    let mut factory = ScriptedFactory::new(Behavior::Succeed);
    factory.gate = Some(Arc::clone(&gate));
    let factory = Arc::new(factory);
    let runner = runner(Arc::clone(&factory), temp.path());

    let params = training_params(temp.path());
    let (first, first_events) = runner.submit(validate(JobDescriptor::Training(params.clone())).unwrap()).unwrap();
    assert!(runner.is_busy(JobKind::Training));

    let err = runner.submit(validate(JobDescriptor::Training(params.clone())).unwrap()).unwrap_err();
    assert!(matches!(err, TrainingError::Busy(JobKind::Training)));

    // A different kind is not blocked.
    let images = temp.path().join("images");
    std::fs::create_dir_all(&images).unwrap();
    write_png(&images.join("a.png"), [10, 20, 30]);
    let model = temp.path().join("best.pt");
    std::fs::write(&model, b"weights").unwrap();
    let inference = InferenceParams { model_path: model, image_dir: images, grayscale: false };
    let (second, second_events) = runner.submit(validate(JobDescriptor::Inference(inference)).unwrap()).unwrap();

    gate.open();
    assert_single_terminal_last(&first_events.collect_blocking());
    assert_single_terminal_last(&second_events.collect_blocking());
    assert_eq!(first.wait(), JobState::Completed);
    assert_eq!(second.wait(), JobState::Completed);

    // The slot is free again and a fresh engine is created for the new job.
    assert!(!runner.is_busy(JobKind::Training));
    let (third, third_events) = runner.submit(validate(JobDescriptor::Training(params)).unwrap()).unwrap();
    assert_single_terminal_last(&third_events.collect_blocking());
    assert_eq!(third.wait(), JobState::Completed);
    assert_eq!(*factory.created.lock().unwrap(), 3);
}

#[test]
fn test_engine_error_becomes_terminal_error_event() {
    let temp = TempDir::new().unwrap();
    let runner = runner(Arc::new(ScriptedFactory::new(Behavior::Fail)), temp.path());

    let descriptor = validate(JobDescriptor::Training(training_params(temp.path()))).unwrap();
    let (handle, events) = runner.submit(descriptor).unwrap();
    let events = events.collect_blocking();

    assert_single_terminal_last(&events);
    match events.last().unwrap() {
        JobEvent::Error { error } => assert!(error.message.contains("CUDA out of memory")),
        other => panic!("unexpected terminal event: {other:?}"),
    }
    assert_eq!(handle.wait(), JobState::Failed);
    assert!(!runner.is_busy(JobKind::Training));
}

#[test]
fn test_engine_panic_is_contained() {
    let temp = TempDir::new().unwrap();
    let runner = runner(Arc::new(ScriptedFactory::new(Behavior::Panic)), temp.path());

    let descriptor = validate(JobDescriptor::Training(training_params(temp.path()))).unwrap();
    let (handle, events) = runner.submit(descriptor).unwrap();
    let events = events.collect_blocking();

    assert_single_terminal_last(&events);
    assert!(matches!(
        events.last().unwrap(),
        JobEvent::Error { error } if error.message.contains("native crash")
    ));
    assert_eq!(handle.wait(), JobState::Failed);
}

#[test]
fn test_inference_skips_unreadable_images_and_resolves_labels() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    std::fs::create_dir_all(&images).unwrap();
    write_png(&images.join("a.png"), [200, 10, 10]);
    std::fs::write(images.join("b.jpg"), b"definitely not a jpeg").unwrap();
    write_png(&images.join("c.png"), [10, 200, 10]);
    let model = temp.path().join("best.pt");
    std::fs::write(&model, b"weights").unwrap();

    let mut factory = ScriptedFactory::new(Behavior::Succeed);
    factory.class_names = Some([(0, "cat".to_string())].into_iter().collect());
    let factory = Arc::new(factory);
    let runner = runner(Arc::clone(&factory), temp.path());

    let params = InferenceParams { model_path: model, image_dir: images.clone(), grayscale: false };
    let (handle, events) = runner.submit(validate(JobDescriptor::Inference(params)).unwrap()).unwrap();
    let events = events.collect_blocking();
    assert_eq!(handle.wait(), JobState::Completed);
    assert_single_terminal_last(&events);

    assert!(events.iter().any(|e| matches!(e, JobEvent::Log { message } if message == "Skipped 1 unreadable image(s)")));

    let JobEvent::Result { output: JobOutput::Inference { results } } = events.last().unwrap() else {
        panic!("expected inference result");
    };
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].image_path, images.join("a.png"));
    assert_eq!(results[1].image_path, images.join("c.png"));
    assert_eq!(results[0].detections[0].class_label, "cat");
    assert_eq!(results[1].detections[0].class_label, "7");
    assert!((results[0].detections[0].confidence - 1.0).abs() < f32::EPSILON);
    assert_eq!(factory.seen.lock().unwrap().len(), 2);
}

#[test]
fn test_grayscale_inference_feeds_three_channel_gray_copies() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    std::fs::create_dir_all(&images).unwrap();
    write_png(&images.join("color.png"), [250, 20, 90]);
    let model = temp.path().join("best.onnx");
    std::fs::write(&model, b"weights").unwrap();

    let gate = Arc::new(Gate::default());
    let mut factory = ScriptedFactory::new(Behavior::Succeed);
    factory.gate = Some(Arc::clone(&gate));
    let factory = Arc::new(factory);
    let runner = runner(Arc::clone(&factory), temp.path());

    let params = InferenceParams { model_path: model, image_dir: images.clone(), grayscale: true };
    let (handle, events) = runner.submit(validate(JobDescriptor::Inference(params)).unwrap()).unwrap();

    // Inspect the staged copy while the engine call is still blocked.
    let staged = loop {
        if let Some(path) = factory.seen.lock().unwrap().first().cloned() {
            break path;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    };
    let pixel = *image::open(&staged).unwrap().as_rgb8().unwrap().get_pixel(0, 0);
    assert_eq!(pixel[0], pixel[1]);
    assert_eq!(pixel[1], pixel[2]);
    assert_ne!(staged, images.join("color.png"));

    gate.open();
    let events = events.collect_blocking();
    assert_eq!(handle.wait(), JobState::Completed);
    let JobEvent::Result { output: JobOutput::Inference { results } } = events.last().unwrap() else {
        panic!("expected inference result");
    };
    assert_eq!(results[0].image_path, images.join("color.png"));
}

#[tokio::test]
async fn test_async_observer_receives_stream() {
    let temp = TempDir::new().unwrap();
    let runner = runner(Arc::new(ScriptedFactory::new(Behavior::Succeed)), temp.path());

    let descriptor = validate(JobDescriptor::Training(training_params(temp.path()))).unwrap();
    let (_handle, mut events) = runner.submit(descriptor).unwrap();

    let mut received = Vec::new();
    while let Some(event) = events.recv().await {
        received.push(event);
    }
    assert_single_terminal_last(&received);
    assert!(matches!(&received[0], JobEvent::Log { message } if message == "Preparing dataset..."));
}
