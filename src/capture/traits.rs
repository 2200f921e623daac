//! Capture trait definitions
//!
//! Platform-agnostic contract for a screen grab source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capture-related errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Monitor {0} not found")]
    MonitorNotFound(u32),

    #[error("Capture source not open")]
    NotOpen,

    #[error("Grab failed: {0}")]
    GrabFailed(String),

    #[error("Platform error: {0}")]
    Platform(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Channel order of a frame's pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Bgra,
    Rgba,
    Bgr24,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Bgra | Self::Rgba => 4,
            Self::Bgr24 => 3,
        }
    }

    /// Name understood by FFmpeg's `-pixel_format`
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::Bgra => "bgra",
            Self::Rgba => "rgba",
            Self::Bgr24 => "bgr24",
        }
    }
}

/// One raw screen grab, row-major
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data,
            captured_at: Utc::now(),
        }
    }

    /// Byte length a buffer of these dimensions must have
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// A source that yields one frame on demand.
///
/// `close` must be safe to call even if `open` never succeeded.
#[async_trait]
pub trait CaptureSource: Send {
    /// Open the source against a monitor (1 = first physical monitor)
    async fn open(&mut self, monitor_index: u32) -> CaptureResult<()>;

    /// Resolution and channel order of frames `grab` will return, once open
    fn frame_format(&self) -> Option<(Resolution, PixelFormat)>;

    /// Grab a single frame
    async fn grab(&mut self) -> CaptureResult<Frame>;

    /// Release the source
    async fn close(&mut self);
}
