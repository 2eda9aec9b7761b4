//! Frame acquisition to disk.
//!
//! Pulls frames from a streaming camera until a frame budget is reached or
//! the device stops, writing each one under a sequential, date-stamped name.

mod acquirer;
mod naming;
mod sink;

pub use acquirer::{Acquisition, AcquisitionReport, StopReason, StopSignal};
pub use naming::FrameNamer;
pub use sink::{FrameSink, PngSink};

use crate::capture::CameraError;
use thiserror::Error;

/// Errors that can occur while persisting a frame.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The file could not be created or written.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// PNG encoding failed.
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
    /// The sample buffer does not match the frame geometry.
    #[error("{samples} samples do not fit a {width}x{height} frame")]
    Malformed {
        /// Frame width in pixels.
        width: u32,
        /// Frame height in pixels.
        height: u32,
        /// Samples actually present.
        samples: usize,
    },
}

/// Errors that end an acquisition run.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The device failed mid-run.
    #[error(transparent)]
    Camera(#[from] CameraError),
    /// A frame could not be persisted.
    #[error("failed to write frame: {0}")]
    Sink(#[from] SinkError),
}
