//! Recording state management
//!
//! Defines the recording state machine, per-recording session counters and
//! the snapshots handed to a UI.

use crate::encoder::EncoderParams;
use crate::utils::time::format_hms;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Frame rate used to turn a frame count into output-video time.
///
/// Independent of the capture interval: one captured frame always plays back
/// as 1/25 s.
pub const ASSUMED_PLAYBACK_FPS: f64 = 25.0;

/// Current state of the recording system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
}

/// Runtime parameters for recordings (not persisted)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderSettings {
    /// Monitor to capture (1 = first physical monitor)
    pub monitor_index: u32,

    /// Directory timestamp-named videos are written to
    pub output_dir: PathBuf,

    /// Fixed encoding parameters
    pub encoder: EncoderParams,

    /// Frame rate assumed when converting frames to video time
    pub playback_fps: f64,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            monitor_index: 1,
            output_dir: PathBuf::from("video"),
            encoder: EncoderParams::default(),
            playback_fps: ASSUMED_PLAYBACK_FPS,
        }
    }
}

/// Output file for a recording started at `at`
pub fn output_path_for(output_dir: &Path, at: DateTime<Local>) -> PathBuf {
    output_dir.join(at.format("%Y-%m-%d %H_%M_%S.mp4").to_string())
}

fn video_duration(frames: u64, playback_fps: f64) -> Duration {
    if playback_fps <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frames as f64 / playback_fps)
}

/// Counters for one Start -> Stop recording
///
/// Only the capture tick mutates the counters; everything else reads them.
#[derive(Debug)]
pub struct TimelapseSession {
    id: Uuid,
    started_at: DateTime<Local>,
    started: Instant,
    output_path: PathBuf,
    frames_written: AtomicU64,
    frames_dropped: AtomicU64,
}

impl TimelapseSession {
    /// Create a new session starting now
    pub fn new(output_dir: &Path) -> Self {
        let started_at = Local::now();
        Self {
            id: Uuid::new_v4(),
            started_at,
            started: Instant::now(),
            output_path: output_path_for(output_dir, started_at),
            frames_written: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::SeqCst)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::SeqCst)
    }

    /// Count a frame handed to the encoder, returning the new total
    pub fn record_frame(&self) -> u64 {
        self.frames_written.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Count a skipped tick, returning the new total
    pub fn record_drop(&self) -> u64 {
        self.frames_dropped.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn elapsed_wall(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn elapsed_video(&self, playback_fps: f64) -> Duration {
        video_duration(self.frames_written(), playback_fps)
    }

    pub fn summary(&self, playback_fps: f64) -> RecordingSummary {
        RecordingSummary {
            session_id: self.id,
            output_path: self.output_path.clone(),
            started_at: self.started_at,
            frames_written: self.frames_written(),
            frames_dropped: self.frames_dropped(),
            elapsed_wall: self.elapsed_wall(),
            elapsed_video: self.elapsed_video(playback_fps),
        }
    }
}

/// Result of a completed recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub session_id: Uuid,
    pub output_path: PathBuf,
    pub started_at: DateTime<Local>,
    pub frames_written: u64,
    pub frames_dropped: u64,
    pub elapsed_wall: Duration,
    pub elapsed_video: Duration,
}

/// Point-in-time view of the controller for a UI to poll
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub state: RecordingState,

    /// Wall-clock time since Start; zero while idle
    pub elapsed_wall: Duration,

    /// Length of the output video so far; after Stop, that of the last recording
    pub elapsed_video: Duration,

    /// Like `elapsed_video`, these hold the last recording's totals while idle
    pub frames_written: u64,
    pub frames_dropped: u64,

    /// Ticks queued behind the one currently running
    pub pending_ticks: usize,

    /// Interval the next recording will use
    pub interval_secs: f64,

    /// Interval the running recording was started with
    pub active_interval_secs: Option<f64>,

    pub output_path: Option<PathBuf>,

    /// Encoder failure that ended the last recording, if any
    pub fault: Option<String>,
}

impl StatusSnapshot {
    pub(crate) fn idle(interval_secs: f64, fault: Option<String>) -> Self {
        Self {
            state: RecordingState::Idle,
            elapsed_wall: Duration::ZERO,
            elapsed_video: Duration::ZERO,
            frames_written: 0,
            frames_dropped: 0,
            pending_ticks: 0,
            interval_secs,
            active_interval_secs: None,
            output_path: None,
            fault,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Wall-clock duration as `H:MM:SS`
    pub fn wall_clock_label(&self) -> String {
        format_hms(self.elapsed_wall)
    }

    /// Output-video duration as `H:MM:SS`
    pub fn video_label(&self) -> String {
        format_hms(self.elapsed_video)
    }
}
