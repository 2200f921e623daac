//! Scripted collaborators for unit tests

use crate::capture::{CaptureError, CaptureResult, CaptureSource, Frame, PixelFormat, Resolution};
use crate::config::{ConfigStore, StoreError};
use crate::encoder::{EncodeError, EncodeResult, EncoderParams, InputFormat, VideoEncoder};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory [`ConfigStore`] that counts saves
#[derive(Clone, Default)]
pub struct MemoryStore {
    bytes: Arc<Mutex<Option<Vec<u8>>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_bytes(bytes: &[u8]) -> Self {
        let store = Self::default();
        *store.bytes.lock() = Some(bytes.to_vec());
        store
    }

    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.bytes.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<Vec<u8>, StoreError> {
        self.bytes
            .lock()
            .clone()
            .ok_or_else(|| StoreError::Unavailable("empty".to_string()))
    }

    fn save(&self, bytes: &[u8]) -> Result<(), StoreError> {
        *self.bytes.lock() = Some(bytes.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Call counters shared between a mock and the test body
#[derive(Clone, Default)]
pub struct CallLog {
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
}

impl CallLog {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Grabs for a capture source, writes for an encoder
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub const MOCK_RESOLUTION: Resolution = Resolution {
    width: 2,
    height: 2,
};

/// Capture source producing 2x2 BGRA frames tagged with their grab number
#[derive(Default)]
pub struct MockCapture {
    pub log: CallLog,
    pub fail_open: bool,
    /// 1-based grab numbers that fail
    pub fail_grabs: HashSet<usize>,
    pub grab_delay: Option<Duration>,
    open: bool,
}

impl MockCapture {
    pub fn new() -> (Self, CallLog) {
        let capture = Self::default();
        let log = capture.log.clone();
        (capture, log)
    }
}

#[async_trait]
impl CaptureSource for MockCapture {
    async fn open(&mut self, _monitor_index: u32) -> CaptureResult<()> {
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(CaptureError::MonitorNotFound(1));
        }
        self.open = true;
        Ok(())
    }

    fn frame_format(&self) -> Option<(Resolution, PixelFormat)> {
        self.open.then_some((MOCK_RESOLUTION, PixelFormat::Bgra))
    }

    async fn grab(&mut self) -> CaptureResult<Frame> {
        let n = self.log.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.grab_delay {
            tokio::time::sleep(delay).await;
        }
        if !self.open {
            return Err(CaptureError::NotOpen);
        }
        if self.fail_grabs.contains(&n) {
            return Err(CaptureError::GrabFailed(format!("grab {n}")));
        }

        let mut data = vec![0u8; 16];
        data[..8].copy_from_slice(&(n as u64).to_le_bytes());
        Ok(Frame::new(
            MOCK_RESOLUTION.width,
            MOCK_RESOLUTION.height,
            PixelFormat::Bgra,
            data,
        ))
    }

    async fn close(&mut self) {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        self.open = false;
    }
}

/// Encoder that records the grab number of every frame it receives
#[derive(Default)]
pub struct MockEncoder {
    pub log: CallLog,
    pub fail_open: bool,
    /// 1-based write number that fails
    pub fail_write: Option<usize>,
    pub written: Arc<Mutex<Vec<u64>>>,
    pub opened_path: Arc<Mutex<Option<PathBuf>>>,
    open: bool,
}

impl MockEncoder {
    pub fn new() -> (Self, CallLog) {
        let encoder = Self::default();
        let log = encoder.log.clone();
        (encoder, log)
    }
}

#[async_trait]
impl VideoEncoder for MockEncoder {
    async fn open(
        &mut self,
        path: &Path,
        _params: &EncoderParams,
        input: InputFormat,
    ) -> EncodeResult<()> {
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(EncodeError::Ffmpeg("codec unavailable".to_string()));
        }
        assert_eq!(input.resolution, MOCK_RESOLUTION);
        *self.opened_path.lock() = Some(path.to_path_buf());
        self.open = true;
        Ok(())
    }

    async fn write(&mut self, frame: &Frame) -> EncodeResult<()> {
        let n = self.log.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.open {
            return Err(EncodeError::NotOpen);
        }
        if self.fail_write == Some(n) {
            return Err(EncodeError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe closed",
            )));
        }

        let mut tag = [0u8; 8];
        tag.copy_from_slice(&frame.data[..8]);
        self.written.lock().push(u64::from_le_bytes(tag));
        Ok(())
    }

    async fn close(&mut self) -> EncodeResult<()> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        self.open = false;
        Ok(())
    }
}
