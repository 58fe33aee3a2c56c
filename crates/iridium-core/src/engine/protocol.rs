//! JSON-lines protocol spoken with the engine bridge process.
//!
//! The request is a single JSON document on the bridge's stdin. The bridge
//! answers with one JSON object per stdout line, tagged by `type`. Lines that
//! are not protocol messages are treated as plain log output.

use iridium_training::{EngineObserver, TrainRequest};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    Log { message: String },
    Epoch { epoch: u32, total: u32 },
    Result { data: serde_json::Value },
    Error { message: String },
}

impl BridgeMessage {
    /// Parse one stdout line. `None` for anything that is not a protocol message.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BridgeRequest<'a> {
    Train(TrainArgs<'a>),
    Predict { model: &'a Path, images: &'a [PathBuf] },
}

/// Training request flattened into the engine's own argument vocabulary.
#[derive(Debug, Serialize)]
pub struct TrainArgs<'a> {
    pub base_model: &'a str,
    pub data_config: &'a Path,
    pub epochs: u32,
    pub batch: u32,
    pub imgsz: u32,
    pub device: Option<&'static str>,
    pub workers: u32,
    pub optimizer: &'static str,
    pub patience: u32,
    pub lr0: f64,
    pub cos_lr: bool,
    pub rect: bool,
    pub cache: bool,
    pub degrees: f64,
    pub fliplr: f64,
    pub mosaic: f64,
    pub project: &'a str,
    pub name: &'a str,
    pub export_onnx: bool,
}

impl<'a> From<&'a TrainRequest> for TrainArgs<'a> {
    fn from(request: &'a TrainRequest) -> Self {
        Self {
            base_model: &request.base_model,
            data_config: &request.data_config,
            epochs: request.epochs,
            batch: request.batch,
            imgsz: request.imgsz,
            device: request.device.engine_token(),
            workers: request.workers,
            optimizer: request.optimizer.engine_token(),
            patience: request.patience,
            lr0: request.lr0,
            cos_lr: request.cos_lr,
            rect: request.rect,
            cache: request.cache,
            degrees: request.augmentation.degrees,
            fliplr: request.augmentation.fliplr,
            mosaic: request.augmentation.mosaic,
            project: &request.project,
            name: &request.name,
            export_onnx: request.export_onnx,
        }
    }
}

/// What a finished bridge stream reported.
#[derive(Debug, Default, PartialEq)]
pub struct BridgeOutcome {
    /// Payload of the last `result` message.
    pub result: Option<serde_json::Value>,
    /// Message of the last `error` message.
    pub error: Option<String>,
}

/// Consume the bridge's stdout, forwarding logs and epochs to `observer`.
///
/// Bytes that are not valid UTF-8 are replaced rather than failing the stream.
pub fn read_messages<R: BufRead>(mut reader: R, observer: &mut dyn EngineObserver) -> std::io::Result<BridgeOutcome> {
    let mut outcome = BridgeOutcome::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        match BridgeMessage::parse(line) {
            Some(BridgeMessage::Log { message }) => observer.on_log(&message),
            Some(BridgeMessage::Epoch { epoch, total }) => {
                debug!(epoch, total, "bridge epoch");
                observer.on_epoch_end(epoch, total);
            }
            Some(BridgeMessage::Result { data }) => outcome.result = Some(data),
            Some(BridgeMessage::Error { message }) => outcome.error = Some(message),
            None => {
                let line = line.trim_end();
                if !line.is_empty() {
                    observer.on_log(line);
                }
            }
        }
    }
    Ok(outcome)
}
