//! Desktop Time Lapse - periodic screenshots assembled into a video.
//!
//! This crate holds the capture/encode scheduling core. A UI or CLI builds a
//! [`TimelapseController`] from an [`IntervalConfig`], a [`CaptureSource`] and a
//! [`VideoEncoder`], then drives it with start/stop/set_interval and polls
//! [`TimelapseController::status`].

pub mod capture;
pub mod config;
pub mod encoder;
pub mod recorder;
pub mod utils;

#[cfg(test)]
mod testing;

pub use capture::{CaptureSource, Frame, PixelFormat};
pub use config::{CaptureInterval, FileConfigStore, IntervalConfig};
pub use encoder::{EncoderParams, FfmpegEncoder, VideoEncoder};
pub use recorder::{RecorderSettings, RecordingState, StatusSnapshot, TimelapseController};
pub use utils::error::{TimelapseError, TimelapseResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the tracing subscriber.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "desktop_timelapse=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Desktop Time Lapse v{}", env!("CARGO_PKG_VERSION"));
}
