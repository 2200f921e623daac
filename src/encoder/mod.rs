//! Video encoder contract
//!
//! The recorder appends frames through [`VideoEncoder`] and finalizes the file
//! on stop. [`ffmpeg::FfmpegEncoder`] is the bundled implementation.

pub mod ffmpeg;

pub use ffmpeg::FfmpegEncoder;

use crate::capture::{Frame, PixelFormat, Resolution};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Encoder-related errors
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("Encoder not open")]
    NotOpen,

    #[error("Encoder already open")]
    AlreadyOpen,

    #[error("Frame is {actual} bytes, expected {expected}")]
    FrameSizeMismatch { expected: usize, actual: usize },
}

pub type EncodeResult<T> = Result<T, EncodeError>;

/// Fixed encoding parameters for a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderParams {
    /// Codec passed to `-c:v`
    pub codec: String,

    /// Constant rate factor (0 = lossless)
    pub crf: u8,

    /// Encoder speed preset
    pub preset: String,

    /// Frame rate written into the output container
    pub fps: u32,
}

impl Default for EncoderParams {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            crf: 0,
            preset: "fast".to_string(),
            fps: 25,
        }
    }
}

/// Shape of the raw frames an encoder will receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFormat {
    pub resolution: Resolution,
    pub pixel_format: PixelFormat,
}

impl InputFormat {
    pub fn frame_len(&self) -> usize {
        self.resolution.width as usize
            * self.resolution.height as usize
            * self.pixel_format.bytes_per_pixel()
    }
}

/// Appends frames to an output file.
///
/// `close` flushes and finalizes; calling it on an encoder that is not open
/// is a no-op.
#[async_trait]
pub trait VideoEncoder: Send {
    async fn open(
        &mut self,
        path: &Path,
        params: &EncoderParams,
        input: InputFormat,
    ) -> EncodeResult<()>;

    async fn write(&mut self, frame: &Frame) -> EncodeResult<()>;

    async fn close(&mut self) -> EncodeResult<()>;
}
