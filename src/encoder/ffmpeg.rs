//! FFmpeg encoder for MP4 output
//!
//! Raw frames are piped into an `ffmpeg` child process over stdin. Closing
//! stdin lets FFmpeg flush and write the container trailer.

use super::{EncodeError, EncodeResult, EncoderParams, InputFormat, VideoEncoder};
use crate::capture::Frame;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::task::JoinHandle;

/// Lines of FFmpeg stderr kept for the error message on a failed close
const STDERR_TAIL_LINES: usize = 20;

/// Build the FFmpeg command line for encoding raw frames from stdin to `output`
pub fn build_encode_args(output: &Path, params: &EncoderParams, input: InputFormat) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pixel_format",
        input.pixel_format.ffmpeg_name(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.extend([
        "-video_size".to_string(),
        format!("{}x{}", input.resolution.width, input.resolution.height),
        "-framerate".to_string(),
        params.fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
        // yuv420p needs even dimensions
        "-vf".to_string(),
        "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
        "-c:v".to_string(),
        params.codec.clone(),
        "-preset".to_string(),
        params.preset.clone(),
        "-crf".to_string(),
        params.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().to_string(),
    ]);

    args
}

/// [`VideoEncoder`] backed by an `ffmpeg` child process
pub struct FfmpegEncoder {
    binary: PathBuf,
    process: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_tail: Option<JoinHandle<String>>,
    input: Option<InputFormat>,
    output: Option<PathBuf>,
    frame_count: u64,
}

impl FfmpegEncoder {
    /// Use `ffmpeg` from PATH
    pub fn new() -> Self {
        Self::with_binary("ffmpeg")
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            process: None,
            stdin: None,
            stderr_tail: None,
            input: None,
            output: None,
            frame_count: 0,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }
}

/// Keep reading stderr so FFmpeg never blocks on a full pipe; returns the tail
fn drain_stderr(stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    tracing::debug!("ffmpeg: {}", line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to read FFmpeg stderr: {}", e);
                    break;
                }
            }
        }
        Vec::from(tail).join("\n")
    })
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn open(
        &mut self,
        path: &Path,
        params: &EncoderParams,
        input: InputFormat,
    ) -> EncodeResult<()> {
        if self.process.is_some() {
            return Err(EncodeError::AlreadyOpen);
        }

        let mut process = Command::new(&self.binary)
            .args(build_encode_args(path, params, input))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EncodeError::Ffmpeg(format!("Failed to start FFmpeg: {}", e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EncodeError::Ffmpeg("Failed to capture FFmpeg stdin".to_string()))?;
        let stderr_tail = process.stderr.take().map(drain_stderr);

        tracing::info!(
            "Started FFmpeg encoder: {}x{} @ {}fps ({} crf {}), output: {:?}",
            input.resolution.width,
            input.resolution.height,
            params.fps,
            params.codec,
            params.crf,
            path
        );

        self.process = Some(process);
        self.stdin = Some(stdin);
        self.stderr_tail = stderr_tail;
        self.input = Some(input);
        self.output = Some(path.to_path_buf());
        self.frame_count = 0;
        Ok(())
    }

    async fn write(&mut self, frame: &Frame) -> EncodeResult<()> {
        let (Some(stdin), Some(input)) = (self.stdin.as_mut(), self.input) else {
            return Err(EncodeError::NotOpen);
        };

        let expected = input.frame_len();
        if frame.data.len() != expected || frame.format != input.pixel_format {
            return Err(EncodeError::FrameSizeMismatch {
                expected,
                actual: frame.data.len(),
            });
        }

        stdin.write_all(&frame.data).await?;
        self.frame_count += 1;
        Ok(())
    }

    async fn close(&mut self) -> EncodeResult<()> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };

        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.shutdown().await {
                tracing::warn!("Failed to flush FFmpeg stdin: {}", e);
            }
        }

        let status = process.wait().await?;
        let stderr = match self.stderr_tail.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        self.input = None;
        let path = self.output.take();

        if !status.success() {
            tracing::warn!("FFmpeg exited with status {}: {}", status, stderr);
            return Err(EncodeError::Ffmpeg(format!(
                "exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        tracing::info!(
            "FFmpeg finished: {} frames, output: {:?}",
            self.frame_count,
            path
        );
        Ok(())
    }
}
