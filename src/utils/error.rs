//! Error types and handling
//!
//! Crate-wide error type returned by the recording control surface.

use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::encoder::EncodeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced to whoever drives the controller
#[derive(Error, Debug)]
pub enum TimelapseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid interval: {0:?}")]
    InvalidInput(String),

    #[error("Interval cannot change while recording")]
    RecordingInProgress,

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Encoder write failed: {0}")]
    EncoderWrite(String),

    #[error("Encoder error: {0}")]
    Encoder(#[from] EncodeError),
}

impl TimelapseError {
    pub(crate) fn capture_unavailable(err: CaptureError) -> Self {
        Self::ResourceUnavailable(format!("capture source: {err}"))
    }

    pub(crate) fn encoder_unavailable(err: EncodeError) -> Self {
        Self::ResourceUnavailable(format!("video encoder: {err}"))
    }
}

/// Error response for frontend
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<TimelapseError> for ErrorResponse {
    fn from(error: TimelapseError) -> Self {
        let code = match &error {
            TimelapseError::Io(_) => "IO_ERROR",
            TimelapseError::Config(_) => "CONFIG_ERROR",
            TimelapseError::InvalidInput(_) => "INVALID_USER_INPUT",
            TimelapseError::RecordingInProgress => "RECORDING_IN_PROGRESS",
            TimelapseError::AlreadyRecording => "ALREADY_RECORDING",
            TimelapseError::ResourceUnavailable(_) => "RESOURCE_UNAVAILABLE",
            TimelapseError::EncoderWrite(_) => "ENCODER_WRITE_FAILURE",
            TimelapseError::Encoder(_) => "ENCODER_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using TimelapseError
pub type TimelapseResult<T> = Result<T, TimelapseError>;
