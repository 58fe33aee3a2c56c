use crate::detection::DetectionResult;
use crate::job::{JobId, JobKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

/// Advisory events emitted while a dataset is split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SplitEvent {
    NoImages { source: PathBuf },
    Started { found: usize, train: usize, val: usize },
    CopiedClasses,
    CopyFinished { images: usize, labels: usize },
    Finished { destination: PathBuf },
}

impl SplitEvent {
    /// Human-readable rendering for log panes.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::NoImages { source } => format!("No images found in {}", source.display()),
            Self::Started { found, train, val } => {
                format!("Found {found} images. Splitting into {train} train, {val} val.")
            }
            Self::CopiedClasses => "Copied classes.txt".to_string(),
            Self::CopyFinished { images, labels } => {
                format!("Copied {images} images and {labels} labels.")
            }
            Self::Finished { destination } => {
                format!("Dataset created at {}", destination.display())
            }
        }
    }
}

pub trait SplitProgress: Send + Sync {
    fn on_event(&self, event: SplitEvent);
}

impl<F> SplitProgress for F
where
    F: Fn(SplitEvent) + Send + Sync,
{
    fn on_event(&self, event: SplitEvent) {
        self(event);
    }
}

/// Forwards split events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingSplitProgress;

impl SplitProgress for TracingSplitProgress {
    fn on_event(&self, event: SplitEvent) {
        info!("{}", event.message());
    }
}

/// Terminal error payload of a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Successful outcome of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOutput {
    Training { artifact_dir: PathBuf },
    Inference { results: Vec<DetectionResult> },
}

/// Everything a job reports to its observer.
///
/// `Result` and `Error` are terminal: exactly one of them closes a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    Log { message: String },
    Progress { percent: u8 },
    Result { output: JobOutput },
    Error { error: ErrorInfo },
}

impl JobEvent {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Error { .. })
    }
}

/// Emit-only side of a job's event stream.
pub trait EventSink: Send {
    fn log(&mut self, message: String);

    fn progress(&mut self, percent: u8);
}

/// Event sink backed by the job's channel. Also mirrors events into `tracing`.
#[derive(Debug)]
pub struct ChannelSink {
    job_id: JobId,
    kind: JobKind,
    tx: UnboundedSender<JobEvent>,
    closed: bool,
}

impl ChannelSink {
    #[must_use]
    pub fn new(job_id: JobId, kind: JobKind, tx: UnboundedSender<JobEvent>) -> Self {
        Self { job_id, kind, tx, closed: false }
    }

    fn send(&mut self, event: JobEvent) {
        if self.closed {
            debug!(job_id = %self.job_id, "dropping event after terminal event");
            return;
        }
        if event.is_terminal() {
            self.closed = true;
        }
        // The observer may have dropped its receiver; the job still runs to completion.
        let _ = self.tx.send(event);
    }

    /// Send the single terminal event. Later calls are ignored.
    pub fn finish(&mut self, outcome: Result<JobOutput, ErrorInfo>) {
        let event = match outcome {
            Ok(output) => JobEvent::Result { output },
            Err(error) => JobEvent::Error { error },
        };
        self.send(event);
    }
}

impl EventSink for ChannelSink {
    fn log(&mut self, message: String) {
        info!(job_id = %self.job_id, kind = %self.kind, "{message}");
        self.send(JobEvent::Log { message });
    }

    fn progress(&mut self, percent: u8) {
        let percent = percent.min(100);
        debug!(job_id = %self.job_id, kind = %self.kind, percent, "progress");
        self.send(JobEvent::Progress { percent });
    }
}
