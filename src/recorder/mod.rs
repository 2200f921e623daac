//! Recording system module
//!
//! - PeriodicTrigger fires capture ticks at the configured interval
//! - TimelapseController owns the Idle/Recording state machine
//! - TimelapseSession tracks counters for one recording

pub mod controller;
pub mod state;
pub mod trigger;

pub use controller::{TickOutcome, TimelapseController, TimelapseEvent};
pub use state::{
    RecorderSettings, RecordingState, RecordingSummary, StatusSnapshot, TimelapseSession,
    ASSUMED_PLAYBACK_FPS,
};
pub use trigger::{PeriodicTrigger, QueueDepth, TriggerError};
