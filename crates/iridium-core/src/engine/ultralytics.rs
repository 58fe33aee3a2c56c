use super::protocol::{read_messages, BridgeOutcome, BridgeRequest, TrainArgs};
use iridium_training::{
    EngineFactory, EngineObserver, EnginePredictions, ModelEngine, TrainRequest, TrainingError, TrainingResult,
};
use serde::Deserialize;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, info};

const BRIDGE_SCRIPT: &str = include_str!("bridge.py");

/// Lines of bridge stderr kept for error reports.
const STDERR_TAIL: usize = 20;

#[derive(Debug, Deserialize)]
struct TrainOutput {
    save_dir: PathBuf,
}

/// Observer used for inference, where the bridge only reports logs.
struct TraceObserver;

impl EngineObserver for TraceObserver {
    fn on_epoch_end(&mut self, _epoch: u32, _total: u32) {}

    fn on_log(&mut self, message: &str) {
        debug!(target: "iridium::bridge", "{message}");
    }
}

/// Runs Ultralytics YOLO in a Python child process, one process per call.
#[derive(Debug, Clone)]
pub struct UltralyticsEngine {
    python: String,
    script: String,
    args: Vec<String>,
}

impl UltralyticsEngine {
    #[must_use]
    pub fn new(python: impl Into<String>) -> Self {
        Self { python: python.into(), script: BRIDGE_SCRIPT.to_string(), args: vec!["-c".to_string()] }
    }

    /// Replace the interpreter invocation. The script is passed after `args`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>, args: Vec<String>, script: impl Into<String>) -> Self {
        self.python = program.into();
        self.args = args;
        self.script = script.into();
        self
    }

    fn run(&self, request: &BridgeRequest<'_>, observer: &mut dyn EngineObserver) -> TrainingResult<serde_json::Value> {
        let payload = serde_json::to_vec(request)?;

        let mut child = Command::new(&self.python)
            .args(&self.args)
            .arg(&self.script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TrainingError::Engine(format!("failed to start {}: {e}", self.python)))?;
        debug!(program = %self.python, pid = child.id(), "bridge started");

        let stderr = child.stderr.take().map(|stderr| {
            std::thread::spawn(move || {
                let mut tail = VecDeque::with_capacity(STDERR_TAIL);
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                while matches!(reader.read_until(b'\n', &mut buf), Ok(n) if n > 0) {
                    let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                    buf.clear();
                    debug!(target: "iridium::bridge", "{line}");
                    if tail.len() == STDERR_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail
            })
        });

        let streamed = Self::exchange(&mut child, &payload, observer);
        if streamed.is_err() {
            // Best effort: the child may already have exited.
            let _ = child.kill();
        }
        let status = child.wait();
        let stderr_tail: Vec<String> =
            stderr.and_then(|handle| handle.join().ok()).map(Vec::from).unwrap_or_default();
        let outcome = streamed?;
        let status = status?;

        if let Some(message) = outcome.error {
            return Err(TrainingError::Engine(message));
        }
        if !status.success() {
            let mut message = format!("engine bridge exited with {status}");
            if let Some(last) = stderr_tail.last() {
                message.push_str(": ");
                message.push_str(last);
            }
            return Err(TrainingError::Engine(message));
        }
        outcome.result.ok_or_else(|| TrainingError::Engine("engine bridge produced no result".to_string()))
    }

    /// Write the request and read the bridge's stdout to the end.
    fn exchange(
        child: &mut Child,
        payload: &[u8],
        observer: &mut dyn EngineObserver,
    ) -> std::io::Result<BridgeOutcome> {
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(payload) {
                // A bridge that exits early reports through its status and stderr.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                other => other?,
            }
        }
        match child.stdout.take() {
            Some(stdout) => read_messages(BufReader::new(stdout), observer),
            None => Ok(BridgeOutcome::default()),
        }
    }
}

impl ModelEngine for UltralyticsEngine {
    fn id(&self) -> &'static str {
        "ultralytics"
    }

    fn train(&mut self, request: &TrainRequest, observer: &mut dyn EngineObserver) -> TrainingResult<PathBuf> {
        info!(base_model = %request.base_model, epochs = request.epochs, "starting bridge training");
        let data = self.run(&BridgeRequest::Train(TrainArgs::from(request)), observer)?;
        let output: TrainOutput = serde_json::from_value(data)?;
        Ok(output.save_dir)
    }

    fn predict(&mut self, model: &Path, images: &[PathBuf]) -> TrainingResult<EnginePredictions> {
        info!(model = %model.display(), images = images.len(), "starting bridge inference");
        let data = self.run(&BridgeRequest::Predict { model, images }, &mut TraceObserver)?;
        Ok(serde_json::from_value(data)?)
    }
}

/// Builds an [`UltralyticsEngine`] for every job.
#[derive(Debug, Clone)]
pub struct UltralyticsFactory {
    engine: UltralyticsEngine,
}

impl UltralyticsFactory {
    #[must_use]
    pub fn new(python: impl Into<String>) -> Self {
        Self { engine: UltralyticsEngine::new(python) }
    }

    #[must_use]
    pub fn from_engine(engine: UltralyticsEngine) -> Self {
        Self { engine }
    }
}

impl EngineFactory for UltralyticsFactory {
    fn create(&self) -> TrainingResult<Box<dyn ModelEngine>> {
        Ok(Box::new(self.engine.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_script_handles_both_commands() {
        assert!(BRIDGE_SCRIPT.contains("def train(request)"));
        assert!(BRIDGE_SCRIPT.contains("def predict(request)"));
        assert!(BRIDGE_SCRIPT.contains("on_fit_epoch_end"));
    }

    #[test]
    fn test_missing_interpreter_is_engine_error() {
        let mut engine = UltralyticsEngine::new("/definitely/not/a/python");
        let err = engine.predict(Path::new("best.pt"), &[]).unwrap_err();
        assert!(matches!(err, TrainingError::Engine(msg) if msg.contains("failed to start")));
    }
}
