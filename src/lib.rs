//! Exposure Capture Library
//!
//! Drives a machine-vision camera to a target brightness with a closed-loop
//! exposure controller, then acquires a bounded sequence of frames to disk.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! operator ─┐
//!           ↓
//! capture → exposure → acquisition → sink (PNG)
//!     ↓         ↑
//!     └─ analysis (mean intensity)
//! ```
//!
//! The camera handle is owned by the caller and passed explicitly to the
//! controller and the acquisition loop; [`session::Session`] ties them
//! together and closes the device on every exit path.
//!
//! # Example
//!
//! ```no_run
//! use exposure_capture::{
//!     acquisition::{Acquisition, FrameNamer, PngSink},
//!     capture::MockCamera,
//!     operator::{FixedOperator, IntensityChoice, RateChoice},
//!     exposure::ConvergenceRate,
//!     session::{Session, SessionPlan},
//! };
//!
//! let plan = SessionPlan::default();
//! let acquisition = Acquisition::new(FrameNamer::today());
//! let mut camera = MockCamera::new();
//! let mut operator = FixedOperator {
//!     rate: RateChoice::Rate(ConvergenceRate::new(0.2).unwrap()),
//!     intensity: IntensityChoice::Target(128),
//! };
//! let mut sink = PngSink::create("captures").unwrap();
//!
//! let report = Session::new(&plan, &acquisition)
//!     .run(&mut camera, &mut operator, &mut sink)
//!     .unwrap();
//! println!("{} frames written", report.acquisition.frames_written);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod acquisition;
pub mod analysis;
pub mod capture;
pub mod config;
pub mod exposure;
pub mod metrics;
pub mod operator;
pub mod session;

// Re-export commonly used types at crate root
pub use acquisition::{Acquisition, AcquisitionReport, FrameNamer, FrameSink, PngSink};
pub use analysis::{mean_intensity, IntensityStats};
pub use capture::{Camera, CameraError, CaptureConfig, Frame, MockCamera, PixelFormat};
pub use config::FileConfig;
pub use exposure::{ConvergenceRate, ConvergenceReport, ExposureController, StepPolicy};
pub use session::{Session, SessionError, SessionPlan, SessionReport};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
