//! Prometheus metrics for capture runs.
//!
//! A run is short-lived, so metrics are written once at exit in text
//! exposition format (suitable for a node exporter textfile collector)
//! rather than served.
//!
//! # Metrics Exposed
//!
//! - `exposure_capture_frames_written_total` - Frames written to disk
//! - `exposure_capture_grab_timeouts_total` - Grabs that returned no frame
//! - `exposure_capture_controller_samples_total` - Controller samples consumed
//! - `exposure_capture_exposure_time_us` - Exposure time left on the device
//! - `exposure_capture_converged` - Controller converged (1) or not (0)
//! - `exposure_capture_last_mean_intensity` - Last controller sample brightness
//! - `exposure_capture_acquisition_seconds` - Acquisition loop duration

mod collector;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
