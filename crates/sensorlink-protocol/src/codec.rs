//! JSON codec for SensorLink frames.

use thiserror::Error;

use crate::messages::{StatusReport, TelemetrySample};

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON serialization failed.
    #[error("Failed to serialize message: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// Encode a telemetry sample for a WebSocket text frame.
pub fn encode_sample(sample: &TelemetrySample) -> Result<String, CodecError> {
    serde_json::to_string(sample).map_err(CodecError::from)
}

/// Decode a telemetry frame, as a viewer would.
pub fn decode_sample(text: &str) -> Result<TelemetrySample, CodecError> {
    serde_json::from_str(text).map_err(CodecError::from)
}

pub fn encode_status(report: &StatusReport) -> Result<String, CodecError> {
    serde_json::to_string(report).map_err(CodecError::from)
}
