//! Single-job-per-kind coordinator.
//!
//! Every submitted job runs on its own named worker thread and reports to
//! exactly one observer through an unbounded channel. A second submission of
//! the same kind is rejected with [`TrainingError::Busy`] while the first is
//! still pending or running; jobs of different kinds may overlap.

use crate::adapter::ModelEngineAdapter;
use crate::description::DatasetDescription;
use crate::engine::EngineFactory;
use crate::error::{TrainingError, TrainingResult};
use crate::job::{JobDescriptor, JobId, JobKind, ValidatedDescriptor};
use crate::progress::{ChannelSink, ErrorInfo, EventSink, JobEvent, JobOutput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Base for relative dataset-description paths.
    pub work_dir: PathBuf,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self { work_dir: PathBuf::from(".") }
    }
}

#[derive(Debug)]
struct JobShared {
    id: JobId,
    kind: JobKind,
    created_at: DateTime<Utc>,
    state: Mutex<JobState>,
}

impl JobShared {
    fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: JobState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

/// Caller-side view of a submitted job. State is read-only from here.
#[derive(Debug)]
pub struct JobHandle {
    shared: Arc<JobShared>,
    thread: Option<JoinHandle<()>>,
}

impl JobHandle {
    #[must_use]
    pub fn id(&self) -> &JobId {
        &self.shared.id
    }

    #[must_use]
    pub fn kind(&self) -> JobKind {
        self.shared.kind
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.shared.created_at
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        self.shared.state()
    }

    /// Block until the worker thread exits and return the final state.
    pub fn wait(mut self) -> JobState {
        if let Some(thread) = self.thread.take() {
            // Worker panics are caught inside the job; a join error cannot carry new information.
            let _ = thread.join();
        }
        self.shared.state()
    }
}

/// Receive end of a job's event stream.
///
/// The stream ends (`None`) after the terminal event once the worker exits.
#[derive(Debug)]
pub struct JobEvents {
    job_id: JobId,
    rx: UnboundedReceiver<JobEvent>,
}

impl JobEvents {
    #[must_use]
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub async fn recv(&mut self) -> Option<JobEvent> {
        self.rx.recv().await
    }

    /// Blocking receive. Must not be called from inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<JobEvent> {
        self.rx.blocking_recv()
    }

    /// Drain the stream up to and including the terminal event.
    pub fn collect_blocking(mut self) -> Vec<JobEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.blocking_recv() {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }
}

type ActiveJobs = Arc<Mutex<HashMap<JobKind, Arc<JobShared>>>>;

fn lock_active(active: &ActiveJobs) -> MutexGuard<'_, HashMap<JobKind, Arc<JobShared>>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct JobRunner {
    factory: Arc<dyn EngineFactory>,
    active: ActiveJobs,
    options: RunnerOptions,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("options", &self.options)
            .field("active", &lock_active(&self.active).keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl JobRunner {
    #[must_use]
    pub fn new(factory: Arc<dyn EngineFactory>, options: RunnerOptions) -> Self {
        Self { factory, active: Arc::new(Mutex::new(HashMap::new())), options }
    }

    /// Whether a job of `kind` is pending or running.
    #[must_use]
    pub fn is_busy(&self, kind: JobKind) -> bool {
        lock_active(&self.active).get(&kind).is_some_and(|job| !job.state().is_terminal())
    }

    /// Start a job on a new worker thread and return without waiting for it.
    pub fn submit(&self, descriptor: ValidatedDescriptor) -> TrainingResult<(JobHandle, JobEvents)> {
        let kind = descriptor.kind();
        let shared = {
            let mut active = lock_active(&self.active);
            if active.get(&kind).is_some_and(|job| !job.state().is_terminal()) {
                return Err(TrainingError::Busy(kind));
            }
            let shared = Arc::new(JobShared {
                id: JobId::new(),
                kind,
                created_at: Utc::now(),
                state: Mutex::new(JobState::Pending),
            });
            active.insert(kind, Arc::clone(&shared));
            shared
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(shared.id.clone(), kind, tx);
        let worker = Worker {
            shared: Arc::clone(&shared),
            active: Arc::clone(&self.active),
            factory: Arc::clone(&self.factory),
            options: self.options.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name(format!("iridium-{kind}"))
            .spawn(move || worker.run(descriptor, sink));

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                shared.set_state(JobState::Failed);
                lock_active(&self.active).remove(&kind);
                return Err(e.into());
            }
        };

        info!(job_id = %shared.id, kind = %kind, "job submitted");
        let events = JobEvents { job_id: shared.id.clone(), rx };
        Ok((JobHandle { shared, thread: Some(thread) }, events))
    }
}

struct Worker {
    shared: Arc<JobShared>,
    active: ActiveJobs,
    factory: Arc<dyn EngineFactory>,
    options: RunnerOptions,
}

impl Worker {
    fn run(self, descriptor: ValidatedDescriptor, mut sink: ChannelSink) {
        self.shared.set_state(JobState::Running);
        info!(job_id = %self.shared.id, kind = %self.shared.kind, "job running");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(descriptor, &mut sink)));
        let outcome = match outcome {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ErrorInfo::new(e.to_string())),
            Err(payload) => Err(ErrorInfo::new(panic_message(payload.as_ref()))),
        };

        let state = match &outcome {
            Ok(_) => JobState::Completed,
            Err(e) => {
                error!(job_id = %self.shared.id, kind = %self.shared.kind, error = %e, "job failed");
                sink.log(format!("Error: {e}"));
                JobState::Failed
            }
        };

        self.shared.set_state(state);
        {
            let mut active = lock_active(&self.active);
            if active.get(&self.shared.kind).is_some_and(|job| job.id == self.shared.id) {
                active.remove(&self.shared.kind);
            }
        }

        info!(job_id = %self.shared.id, kind = %self.shared.kind, state = ?state, "job finished");
        sink.finish(outcome);
    }

    /// The engine lives only for the duration of this call.
    fn execute(&self, descriptor: ValidatedDescriptor, sink: &mut ChannelSink) -> TrainingResult<JobOutput> {
        let engine = self.factory.create()?;
        let mut adapter = ModelEngineAdapter::new(engine);

        match descriptor.into_inner() {
            JobDescriptor::Training(params) => {
                sink.log("Preparing dataset...".to_string());
                let output = self.options.work_dir.join(&params.data_config);
                let description = DatasetDescription::new(
                    &params.train_images,
                    params.val_images.as_deref(),
                    params.class_mapping(),
                    &output,
                )?;
                let data_config = description.write(&output)?;
                sink.log(format!("Data config created at {}", data_config.display()));

                let artifact_dir = adapter.run_training(&params, &data_config, sink)?;
                Ok(JobOutput::Training { artifact_dir })
            }
            JobDescriptor::Inference(params) => {
                let results =
                    adapter.run_inference(&params.model_path, &params.image_dir, params.grayscale, sink)?;
                sink.log(format!("Inference produced {} result(s)", results.len()));
                Ok(JobOutput::Inference { results })
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("engine panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("engine panicked: {s}")
    } else {
        "engine panicked".to_string()
    }
}
