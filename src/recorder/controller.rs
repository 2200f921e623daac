//! Time-lapse controller
//!
//! Owns the Idle/Recording state machine. Start opens the capture source and
//! encoder and starts the periodic trigger; each tick grabs one frame and
//! appends it to the encoder; Stop drains the trigger and then finalizes.
//!
//! Locks, always taken in this order when nested:
//! - `lifecycle` (async): Start, Stop and SetInterval transitions
//! - `pipeline` (async): the capture/encode handles, held for a whole tick
//! - `live` (sync, never held across an await): what `status()` reads

use super::state::{RecorderSettings, RecordingState, RecordingSummary, StatusSnapshot, TimelapseSession};
use super::trigger::{PeriodicTrigger, QueueDepth};
use crate::capture::CaptureSource;
use crate::config::{CaptureInterval, ConfigError, IntervalConfig};
use crate::encoder::{InputFormat, VideoEncoder};
use crate::utils::error::{TimelapseError, TimelapseResult};
use parking_lot::RwLock;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

/// Events emitted during recording
#[derive(Debug, Clone)]
pub enum TimelapseEvent {
    /// Recording started
    Started { output_path: PathBuf },
    /// A frame reached the encoder
    FrameWritten { frames_written: u64 },
    /// A grab failed and the tick was skipped
    FrameDropped { frames_dropped: u64 },
    /// The encoder failed; the recording is being stopped
    Faulted(String),
    /// Recording stopped and the file is finalized
    Stopped(RecordingSummary),
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Frame appended; carries the new frame count
    Written(u64),
    /// Grab failed, nothing written
    Dropped,
    /// Encoder write failed; a stop has been requested
    Faulted(String),
    /// No recording to feed
    Inactive,
}

struct ActiveRecording {
    trigger: PeriodicTrigger,
    session: Arc<TimelapseSession>,
}

struct Lifecycle {
    config: IntervalConfig,
    active: Option<ActiveRecording>,
}

struct Pipeline {
    capture: Box<dyn CaptureSource>,
    encoder: Box<dyn VideoEncoder>,
    session: Option<Arc<TimelapseSession>>,
}

struct LiveStatus {
    state: RecordingState,
    session: Option<Arc<TimelapseSession>>,
    queue: Option<QueueDepth>,
    interval: CaptureInterval,
    active_interval: Option<CaptureInterval>,
    fault: Option<String>,
    last_recording: Option<RecordingSummary>,
}

struct Inner {
    settings: RecorderSettings,
    lifecycle: Mutex<Lifecycle>,
    pipeline: Mutex<Pipeline>,
    live: RwLock<LiveStatus>,
    event_tx: broadcast::Sender<TimelapseEvent>,
}

/// Drives periodic capture into a single video file per recording.
///
/// Cheap to clone; all clones control the same recorder. Call
/// [`shutdown`](Self::shutdown) before exiting so an active recording is
/// finalized.
#[derive(Clone)]
pub struct TimelapseController {
    inner: Arc<Inner>,
}

impl TimelapseController {
    pub fn new(
        settings: RecorderSettings,
        config: IntervalConfig,
        capture: Box<dyn CaptureSource>,
        encoder: Box<dyn VideoEncoder>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let interval = config.current();

        Self {
            inner: Arc::new(Inner {
                settings,
                lifecycle: Mutex::new(Lifecycle {
                    config,
                    active: None,
                }),
                pipeline: Mutex::new(Pipeline {
                    capture,
                    encoder,
                    session: None,
                }),
                live: RwLock::new(LiveStatus {
                    state: RecordingState::Idle,
                    session: None,
                    queue: None,
                    interval,
                    active_interval: None,
                    fault: None,
                    last_recording: None,
                }),
                event_tx,
            }),
        }
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<TimelapseEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn state(&self) -> RecordingState {
        self.inner.live.read().state
    }

    /// Interval the next recording will use
    pub fn interval(&self) -> CaptureInterval {
        self.inner.live.read().interval
    }

    /// Summary of the most recently finished recording
    pub fn last_recording(&self) -> Option<RecordingSummary> {
        self.inner.live.read().last_recording.clone()
    }

    /// Start recording; returns the output file path.
    pub async fn start(&self) -> TimelapseResult<PathBuf> {
        let inner = &self.inner;
        let mut lifecycle = inner.lifecycle.lock().await;
        if lifecycle.active.is_some() {
            tracing::warn!("Start ignored: already recording");
            return Err(TimelapseError::AlreadyRecording);
        }

        let interval = lifecycle.config.current();
        let output_dir = &inner.settings.output_dir;
        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            TimelapseError::ResourceUnavailable(format!("output directory {:?}: {}", output_dir, e))
        })?;

        let session = Arc::new(TimelapseSession::new(output_dir));
        tracing::info!(
            "Starting recording {} to {:?} every {}",
            session.id(),
            session.output_path(),
            interval
        );

        {
            let mut pipeline = inner.pipeline.lock().await;
            inner.open_pipeline(&mut pipeline, &session).await?;
            pipeline.session = Some(session.clone());
        }

        let weak = Arc::downgrade(inner);
        let trigger = match PeriodicTrigger::start(interval.as_duration(), move || {
            Inner::scheduled_tick(weak.clone())
        }) {
            Ok(trigger) => trigger,
            Err(e) => {
                let mut pipeline = inner.pipeline.lock().await;
                pipeline.session = None;
                if let Err(close_err) = Inner::release_pipeline(&mut pipeline).await {
                    tracing::warn!("Failed to close encoder: {}", close_err);
                }
                return Err(TimelapseError::ResourceUnavailable(e.to_string()));
            }
        };

        {
            let mut live = inner.live.write();
            live.state = RecordingState::Recording;
            live.session = Some(session.clone());
            live.queue = Some(trigger.queue_depth());
            live.active_interval = Some(interval);
            live.fault = None;
        }

        let output_path = session.output_path().to_path_buf();
        lifecycle.active = Some(ActiveRecording { trigger, session });

        let _ = inner.event_tx.send(TimelapseEvent::Started {
            output_path: output_path.clone(),
        });
        tracing::info!("Recording started");
        Ok(output_path)
    }

    /// Stop recording and finalize the video.
    ///
    /// Waits for an in-flight tick before closing the encoder. Returns `None`
    /// when nothing was recording.
    pub async fn stop(&self) -> TimelapseResult<Option<RecordingSummary>> {
        self.inner.stop_recording(None).await
    }

    /// Stop any active recording before the process exits
    pub async fn shutdown(&self) -> TimelapseResult<()> {
        tracing::info!("Shutting down time-lapse controller");
        self.stop().await.map(|_| ())
    }

    /// Change the capture interval from user-entered text.
    ///
    /// Rejected while recording; the new value applies from the next Start.
    pub async fn set_interval(&self, raw: &str) -> TimelapseResult<CaptureInterval> {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        if lifecycle.active.is_some() {
            tracing::info!("Interval change to {:?} ignored while recording", raw);
            return Err(TimelapseError::RecordingInProgress);
        }

        let interval = lifecycle.config.set(raw).map_err(|e| match e {
            ConfigError::InvalidInterval(raw) => TimelapseError::InvalidInput(raw),
            other => TimelapseError::Config(other),
        })?;

        self.inner.live.write().interval = interval;
        tracing::info!("Capture interval set to {}", interval);
        Ok(interval)
    }

    /// Run one capture+encode attempt now, serialized with scheduled ticks
    pub async fn tick(&self) -> TickOutcome {
        self.inner.tick_and_escalate().await
    }

    /// Snapshot for display; never waits on capture or encoder I/O
    pub fn status(&self) -> StatusSnapshot {
        let live = self.inner.live.read();
        let mut snapshot = StatusSnapshot::idle(live.interval.as_secs(), live.fault.clone());

        if let (RecordingState::Recording, Some(session)) = (live.state, live.session.as_ref()) {
            snapshot.state = RecordingState::Recording;
            snapshot.elapsed_wall = session.elapsed_wall();
            snapshot.elapsed_video = session.elapsed_video(self.inner.settings.playback_fps);
            snapshot.frames_written = session.frames_written();
            snapshot.frames_dropped = session.frames_dropped();
            snapshot.pending_ticks = live.queue.as_ref().map(QueueDepth::get).unwrap_or(0);
            snapshot.active_interval_secs = live.active_interval.map(|i| i.as_secs());
            snapshot.output_path = Some(session.output_path().to_path_buf());
        } else if let Some(last) = live.last_recording.as_ref() {
            // Counters keep their final values until the next Start
            snapshot.elapsed_video = last.elapsed_video;
            snapshot.frames_written = last.frames_written;
            snapshot.frames_dropped = last.frames_dropped;
        }

        snapshot
    }
}

impl Inner {
    /// Open capture then encoder; on failure nothing is left open
    async fn open_pipeline(
        &self,
        pipeline: &mut Pipeline,
        session: &TimelapseSession,
    ) -> TimelapseResult<()> {
        let monitor = self.settings.monitor_index;

        if let Err(e) = pipeline.capture.open(monitor).await {
            tracing::error!("Failed to open capture on monitor {}: {}", monitor, e);
            pipeline.capture.close().await;
            return Err(TimelapseError::capture_unavailable(e));
        }

        let Some((resolution, pixel_format)) = pipeline.capture.frame_format() else {
            tracing::error!("Capture source reported no frame format");
            pipeline.capture.close().await;
            return Err(TimelapseError::ResourceUnavailable(
                "capture source reported no frame format".to_string(),
            ));
        };

        let input = InputFormat {
            resolution,
            pixel_format,
        };
        if let Err(e) = pipeline
            .encoder
            .open(session.output_path(), &self.settings.encoder, input)
            .await
        {
            tracing::error!("Failed to open encoder: {}", e);
            pipeline.capture.close().await;
            return Err(TimelapseError::encoder_unavailable(e));
        }

        tracing::debug!(
            "Pipeline open: monitor {} at {}x{}",
            monitor,
            resolution.width,
            resolution.height
        );
        Ok(())
    }

    /// Finalize the encoder, then release the capture source
    async fn release_pipeline(pipeline: &mut Pipeline) -> Result<(), crate::encoder::EncodeError> {
        let finalized = pipeline.encoder.close().await;
        pipeline.capture.close().await;
        finalized
    }

    async fn scheduled_tick(weak: Weak<Inner>) -> ControlFlow<()> {
        let Some(inner) = weak.upgrade() else {
            return ControlFlow::Break(());
        };

        match inner.tick_and_escalate().await {
            TickOutcome::Written(_) | TickOutcome::Dropped => ControlFlow::Continue(()),
            TickOutcome::Faulted(_) | TickOutcome::Inactive => ControlFlow::Break(()),
        }
    }

    async fn tick_and_escalate(self: &Arc<Self>) -> TickOutcome {
        let (outcome, session_id) = self.run_tick().await;

        if let (TickOutcome::Faulted(message), Some(session_id)) = (&outcome, session_id) {
            // Stop waits on the trigger worker, which may be the caller, so it
            // has to run on its own task.
            let inner = Arc::clone(self);
            let message = message.clone();
            tokio::spawn(async move {
                tracing::warn!("Stopping recording after encoder failure: {}", message);
                if let Err(e) = inner.stop_recording(Some(session_id)).await {
                    tracing::error!("Forced stop failed: {}", e);
                }
            });
        }

        outcome
    }

    /// One grab+write; also returns the id of the session it fed
    async fn run_tick(&self) -> (TickOutcome, Option<Uuid>) {
        let mut pipeline = self.pipeline.lock().await;
        let Some(session) = pipeline.session.clone() else {
            return (TickOutcome::Inactive, None);
        };

        let frame = match pipeline.capture.grab().await {
            Ok(frame) => frame,
            Err(e) => {
                let frames_dropped = session.record_drop();
                tracing::debug!("Grab failed, skipping tick ({} dropped): {}", frames_dropped, e);
                let _ = self
                    .event_tx
                    .send(TimelapseEvent::FrameDropped { frames_dropped });
                return (TickOutcome::Dropped, Some(session.id()));
            }
        };

        if let Err(e) = pipeline.encoder.write(&frame).await {
            let message = e.to_string();
            tracing::error!("Encoder write failed: {}", message);

            // No further frames go to a broken encoder.
            pipeline.session = None;
            self.live.write().fault = Some(message.clone());
            let _ = self.event_tx.send(TimelapseEvent::Faulted(message.clone()));
            return (TickOutcome::Faulted(message), Some(session.id()));
        }

        let frames_written = session.record_frame();
        tracing::trace!("Wrote frame {}", frames_written);
        let _ = self
            .event_tx
            .send(TimelapseEvent::FrameWritten { frames_written });
        (TickOutcome::Written(frames_written), Some(session.id()))
    }

    /// Stop the active recording; with `only`, leave any other session running
    async fn stop_recording(&self, only: Option<Uuid>) -> TimelapseResult<Option<RecordingSummary>> {
        let mut lifecycle = self.lifecycle.lock().await;
        if let (Some(id), Some(active)) = (only, lifecycle.active.as_ref()) {
            if active.session.id() != id {
                tracing::debug!("Forced stop skipped: recording {} already ended", id);
                return Ok(None);
            }
        }
        let Some(mut active) = lifecycle.active.take() else {
            tracing::debug!("Stop ignored: not recording");
            return Ok(None);
        };

        tracing::info!("Stopping recording {}", active.session.id());

        // No tick may touch the encoder once it starts finalizing.
        active.trigger.stop().await;

        let finalized = {
            let mut pipeline = self.pipeline.lock().await;
            pipeline.session = None;
            Self::release_pipeline(&mut pipeline).await
        };

        let summary = active.session.summary(self.settings.playback_fps);
        {
            let mut live = self.live.write();
            live.state = RecordingState::Idle;
            live.session = None;
            live.queue = None;
            live.active_interval = None;
            live.last_recording = Some(summary.clone());
        }

        let _ = self.event_tx.send(TimelapseEvent::Stopped(summary.clone()));
        tracing::info!(
            "Recording stopped: {} frames ({} dropped) over {:?}, video {:?}",
            summary.frames_written,
            summary.frames_dropped,
            summary.elapsed_wall,
            summary.elapsed_video
        );

        if let Err(e) = finalized {
            tracing::error!("Failed to finalize {:?}: {}", summary.output_path, e);
            return Err(TimelapseError::Encoder(e));
        }
        Ok(Some(summary))
    }
}
