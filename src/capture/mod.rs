//! Camera input and frame handling.
//!
//! This module is the frame source: it abstracts "grab a frame or time
//! out" behind the [`Camera`] trait and carries the capture configuration
//! applied before streaming starts.

mod camera;
mod config;
mod frame;
#[cfg(feature = "camera")]
mod native;

pub use camera::{Camera, CameraError, ExposureRange, MockCamera};
pub use config::{CaptureConfig, GrabStrategy};
pub use frame::{Frame, PixelFormat};
#[cfg(feature = "camera")]
pub use native::NativeCamera;
