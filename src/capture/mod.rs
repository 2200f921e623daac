//! Screen capture contract
//!
//! The concrete grab mechanism lives outside this crate; the recorder only
//! talks to [`CaptureSource`].

pub mod traits;

pub use traits::{
    CaptureError, CaptureResult, CaptureSource, Frame, PixelFormat, Resolution,
};
