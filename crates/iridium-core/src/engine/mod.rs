//! Detection engines backed by external processes.

pub mod protocol;
pub mod ultralytics;

pub use protocol::{read_messages, BridgeMessage, BridgeOutcome, BridgeRequest, TrainArgs};
pub use ultralytics::{UltralyticsEngine, UltralyticsFactory};
