//! Closed-loop exposure convergence.
//!
//! Samples frame brightness, compares it to a setpoint and rescales the
//! exposure time multiplicatively until the brightness is within a relative
//! tolerance of the setpoint or the sample budget is spent.

use super::{ConvergenceRate, ExposureError, StepPolicy};
use crate::analysis::IntensityStats;
use crate::capture::Camera;
use std::time::Duration;

/// Default relative error at which the controller stops.
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// Outcome of one controller run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceReport {
    /// Exposure time left on the device, in microseconds.
    pub final_exposure_us: f64,
    /// True if a sample landed within tolerance of the setpoint.
    pub converged: bool,
    /// Samples consumed from the budget, timeouts included.
    pub samples: u32,
    /// Samples that timed out.
    pub timeouts: u32,
    /// Mean intensity of the last analyzed frame.
    pub last_intensity: Option<f64>,
}

/// Drives the device exposure toward a target mean intensity.
#[derive(Debug, Clone)]
pub struct ExposureController {
    policy: StepPolicy,
    tolerance: f64,
}

impl Default for ExposureController {
    fn default() -> Self {
        Self::new(StepPolicy::default())
    }
}

impl ExposureController {
    /// Creates a controller with the default tolerance.
    pub fn new(policy: StepPolicy) -> Self {
        Self {
            policy,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Overrides the relative tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Direction rule applied on overshoot.
    pub fn policy(&self) -> StepPolicy {
        self.policy
    }

    /// Returns true if `intensity` is within tolerance of `target`.
    #[inline]
    pub fn within_tolerance(&self, intensity: f64, target: f64) -> bool {
        (intensity / target - 1.0).abs() <= self.tolerance
    }

    /// Runs up to `max_samples` grab-measure-adjust iterations.
    ///
    /// The setpoint is validated before any frame is requested. Timed out
    /// grabs consume a sample without adjusting anything. Every analyzed
    /// sample adjusts the exposure first; the tolerance check on that
    /// sample's intensity then decides whether to stop.
    pub fn converge<C: Camera + ?Sized>(
        &self,
        camera: &mut C,
        target_intensity: f64,
        max_samples: u32,
        rate: ConvergenceRate,
        timeout: Duration,
    ) -> Result<ConvergenceReport, ExposureError> {
        if !(target_intensity > 0.0 && target_intensity <= 255.0) {
            return Err(ExposureError::InvalidSetpoint(target_intensity));
        }

        let range = camera.exposure_range()?;
        let mut exposure_us = camera.exposure_us()?;
        let mut report = ConvergenceReport {
            final_exposure_us: exposure_us,
            converged: false,
            samples: 0,
            timeouts: 0,
            last_intensity: None,
        };

        tracing::info!(
            target = target_intensity,
            rate = rate.get(),
            max_samples,
            policy = ?self.policy,
            exposure_us,
            "Adjusting exposure time"
        );

        for sample in 0..max_samples {
            report.samples = sample + 1;

            let Some(frame) = camera.try_grab(timeout)? else {
                report.timeouts += 1;
                tracing::debug!(sample, "Sample timed out");
                continue;
            };
            let Some(stats) = IntensityStats::analyze(&frame) else {
                tracing::warn!(sample, ?frame, "Skipping frame without usable pixels");
                continue;
            };

            let intensity = stats.mean;
            report.last_intensity = Some(intensity);

            let requested = self
                .policy
                .next_exposure(exposure_us, intensity, target_intensity, rate);
            let next = range.clamp(requested);
            if next != requested {
                tracing::debug!(requested, clamped = next, "Exposure saturated at device bound");
            }
            if next != exposure_us {
                camera.set_exposure_us(next)?;
                exposure_us = next;
            }
            tracing::trace!(sample, intensity, exposure_us, "Exposure adjusted");

            if self.within_tolerance(intensity, target_intensity) {
                report.converged = true;
                tracing::debug!(sample, intensity, exposure_us, "Within tolerance");
                break;
            }
        }

        report.final_exposure_us = exposure_us;
        if report.converged {
            tracing::info!(
                exposure_us,
                samples = report.samples,
                "Exposure converged"
            );
        } else {
            tracing::warn!(
                exposure_us,
                samples = report.samples,
                timeouts = report.timeouts,
                last_intensity = ?report.last_intensity,
                "Exposure did not converge within the sample budget"
            );
        }
        Ok(report)
    }
}
