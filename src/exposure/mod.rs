//! Exposure time convergence.
//!
//! The controller owns no state between runs: the exposure time lives on
//! the camera handle passed to [`ExposureController::converge`].

mod controller;
mod step;

pub use controller::{ConvergenceReport, ExposureController, DEFAULT_TOLERANCE};
pub use step::{ConvergenceRate, StepPolicy};

use crate::capture::CameraError;
use thiserror::Error;

/// Errors that can occur while adjusting exposure.
#[derive(Debug, Error)]
pub enum ExposureError {
    /// Target intensity outside (0, 255].
    #[error("invalid setpoint {0}: target intensity must lie in (0, 255]")]
    InvalidSetpoint(f64),
    /// Convergence rate outside (0, 1].
    #[error("invalid convergence rate {0}: must lie in (0, 1]")]
    InvalidRate(f64),
    /// The device failed while sampling.
    #[error(transparent)]
    Camera(#[from] CameraError),
}
