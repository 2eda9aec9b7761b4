//! One capture run from device open to device close.
//!
//! ```text
//! open → configure → stream → [operator → controller] → acquisition → close
//! ```
//!
//! The device is closed on every exit path, including errors raised while
//! configuring, converging or acquiring.

use crate::acquisition::{Acquisition, AcquisitionError, AcquisitionReport, FrameSink};
use crate::capture::{Camera, CameraError, CaptureConfig};
use crate::config::FileConfig;
use crate::exposure::{ConvergenceReport, ExposureController, ExposureError};
use crate::operator::{IntensityChoice, Operator, RateChoice};
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use thiserror::Error;

/// Errors that abort a session. The device is closed before they surface.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Opening, configuring or streaming the device failed.
    #[error("device failure: {0}")]
    Camera(#[from] CameraError),
    /// The controller hit a device failure while sampling.
    #[error("exposure adjustment failed: {0}")]
    Exposure(#[from] ExposureError),
    /// The acquisition loop stopped on a device or sink failure.
    #[error("acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),
    /// Reading the operator's answers failed.
    #[error("operator input failed: {0}")]
    Operator(#[from] std::io::Error),
}

/// Everything a session needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    /// Device settings applied at open.
    pub capture: CaptureConfig,
    /// Whether the operator is asked to run the controller.
    pub adjust_exposure: bool,
    /// Controller run when the operator supplies a target.
    pub controller: ExposureController,
    /// Sample budget for the controller.
    pub max_samples: u32,
    /// Grab timeout while converging.
    pub exposure_timeout: Duration,
    /// Frame budget for acquisition.
    pub max_frames: u32,
    /// Grab timeout while acquiring.
    pub acquisition_timeout: Duration,
}

impl Default for SessionPlan {
    fn default() -> Self {
        Self::from_config(&FileConfig::default())
    }
}

impl SessionPlan {
    /// Builds a plan from a validated configuration.
    pub fn from_config(config: &FileConfig) -> Self {
        Self {
            capture: config.capture.clone(),
            adjust_exposure: config.exposure.enabled,
            controller: ExposureController::new(config.exposure.step_policy)
                .with_tolerance(config.exposure.tolerance),
            max_samples: config.exposure.max_samples,
            exposure_timeout: Duration::from_millis(config.exposure.timeout_ms),
            max_frames: config.acquisition.max_frames,
            acquisition_timeout: Duration::from_millis(config.acquisition.timeout_ms),
        }
    }
}

/// What happened to the exposure before acquisition.
#[derive(Debug, Clone, PartialEq)]
pub enum ExposureOutcome {
    /// Adjustment disabled by configuration.
    Disabled,
    /// Operator quit at the convergence-rate prompt.
    Skipped,
    /// Operator quit at the intensity prompt.
    Aborted,
    /// The setpoint could not be used; the exposure was left untouched.
    Rejected(String),
    /// The controller ran.
    Adjusted(ConvergenceReport),
}

/// Result of a completed session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// What happened to the exposure before acquisition.
    pub exposure: ExposureOutcome,
    /// Frames written and why the loop stopped.
    pub acquisition: AcquisitionReport,
    /// Exposure time in effect during acquisition, in microseconds.
    pub final_exposure_us: f64,
}

/// Closes the wrapped camera when dropped.
pub struct DeviceGuard<'a, C: Camera + ?Sized> {
    camera: &'a mut C,
}

impl<'a, C: Camera + ?Sized> DeviceGuard<'a, C> {
    /// Takes charge of closing `camera` when the guard drops.
    pub fn new(camera: &'a mut C) -> Self {
        Self { camera }
    }
}

impl<C: Camera + ?Sized> Deref for DeviceGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.camera
    }
}

impl<C: Camera + ?Sized> DerefMut for DeviceGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.camera
    }
}

impl<C: Camera + ?Sized> Drop for DeviceGuard<'_, C> {
    fn drop(&mut self) {
        if self.camera.is_streaming() {
            if let Err(e) = self.camera.stop_streaming() {
                tracing::warn!(error = %e, "Failed to stop streaming");
            }
        }
        self.camera.close();
    }
}

/// Runs one session against the given collaborators.
pub struct Session<'a> {
    plan: &'a SessionPlan,
    acquisition: &'a Acquisition,
}

impl<'a> Session<'a> {
    /// Binds a plan to the acquisition loop it will drive.
    pub fn new(plan: &'a SessionPlan, acquisition: &'a Acquisition) -> Self {
        Self { plan, acquisition }
    }

    /// Opens the camera, optionally adjusts exposure, then acquires frames.
    ///
    /// The device is stopped and closed before this returns, whether the
    /// run succeeds or fails.
    pub fn run<C, O, S>(
        &self,
        camera: &mut C,
        operator: &mut O,
        sink: &mut S,
    ) -> Result<SessionReport, SessionError>
    where
        C: Camera + ?Sized,
        O: Operator + ?Sized,
        S: FrameSink + ?Sized,
    {
        let mut device = DeviceGuard::new(camera);

        device.open(&self.plan.capture)?;
        self.configure(&mut *device)?;
        device.start_streaming()?;

        let exposure = if self.plan.adjust_exposure {
            self.adjust_exposure(&mut *device, operator)?
        } else {
            ExposureOutcome::Disabled
        };

        let final_exposure_us = device.exposure_us()?;
        let acquisition = self.acquisition.acquire(
            &mut *device,
            sink,
            self.plan.max_frames,
            self.plan.acquisition_timeout,
        )?;

        Ok(SessionReport {
            exposure,
            acquisition,
            final_exposure_us,
        })
    }

    fn configure<C: Camera + ?Sized>(&self, camera: &mut C) -> Result<(), CameraError> {
        let capture = &self.plan.capture;
        let range = camera.exposure_range()?;
        let start = capture
            .start_exposure_us
            .map_or(range.min_us, |us| range.clamp(us));

        camera.set_exposure_us(start)?;
        camera.set_pixel_format(capture.pixel_format)?;
        camera.set_grab_strategy(capture.grab_strategy)?;

        tracing::info!(
            exposure_us = start,
            pixel_format = %capture.pixel_format,
            grab_strategy = ?capture.grab_strategy,
            "Camera configured"
        );
        Ok(())
    }

    fn adjust_exposure<C, O>(
        &self,
        camera: &mut C,
        operator: &mut O,
    ) -> Result<ExposureOutcome, SessionError>
    where
        C: Camera + ?Sized,
        O: Operator + ?Sized,
    {
        let rate = match operator.convergence_rate()? {
            RateChoice::Rate(rate) => rate,
            RateChoice::Skip => {
                tracing::info!("Exposure adjustment skipped by operator");
                return Ok(ExposureOutcome::Skipped);
            }
        };
        let target = match operator.target_intensity()? {
            IntensityChoice::Target(target) => target,
            IntensityChoice::Abort => {
                tracing::info!("Exposure adjustment aborted by operator");
                return Ok(ExposureOutcome::Aborted);
            }
        };

        match self.plan.controller.converge(
            camera,
            f64::from(target),
            self.plan.max_samples,
            rate,
            self.plan.exposure_timeout,
        ) {
            Ok(report) => Ok(ExposureOutcome::Adjusted(report)),
            Err(e @ ExposureError::InvalidSetpoint(_)) => {
                tracing::warn!(error = %e, "Keeping current exposure");
                Ok(ExposureOutcome::Rejected(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{FrameNamer, SinkError, StopReason};
    use crate::capture::{ExposureRange, Frame, GrabStrategy, MockCamera, PixelFormat};
    use crate::exposure::ConvergenceRate;
    use crate::operator::FixedOperator;
    use std::path::PathBuf;

    #[derive(Default)]
    struct RecordingSink {
        names: Vec<String>,
    }

    impl FrameSink for RecordingSink {
        fn write(&mut self, name: &str, _frame: &Frame) -> Result<PathBuf, SinkError> {
            self.names.push(name.to_owned());
            Ok(PathBuf::from(name))
        }
    }

    fn plan(max_frames: u32) -> SessionPlan {
        SessionPlan {
            capture: CaptureConfig {
                width: 8,
                height: 8,
                pixel_format: PixelFormat::Mono8,
                ..CaptureConfig::default()
            },
            max_frames,
            ..SessionPlan::default()
        }
    }

    fn acquisition() -> Acquisition {
        Acquisition::new(FrameNamer::with_stamp("2024-05-06"))
    }

    fn operator(rate: RateChoice, intensity: IntensityChoice) -> FixedOperator {
        FixedOperator { rate, intensity }
    }

    fn rate(value: f64) -> RateChoice {
        RateChoice::Rate(ConvergenceRate::new(value).unwrap())
    }

    #[test]
    fn test_configures_and_closes() {
        let plan = SessionPlan {
            adjust_exposure: false,
            ..plan(2)
        };
        let acquisition = acquisition();
        let mut camera = MockCamera::new();
        let mut sink = RecordingSink::default();
        let mut op = operator(RateChoice::Skip, IntensityChoice::Abort);

        let report = Session::new(&plan, &acquisition)
            .run(&mut camera, &mut op, &mut sink)
            .unwrap();

        assert_eq!(report.exposure, ExposureOutcome::Disabled);
        assert_eq!(report.acquisition.frames_written, 2);
        assert_eq!(report.final_exposure_us, 20.0);
        assert_eq!(camera.pixel_format(), PixelFormat::Mono8);
        assert_eq!(camera.grab_strategy(), GrabStrategy::OneByOne);
        assert!(!camera.is_open());
        assert_eq!(camera.close_calls(), 1);
    }

    #[test]
    fn test_start_exposure_clamped_to_range() {
        let mut plan = plan(0);
        plan.adjust_exposure = false;
        plan.capture.start_exposure_us = Some(5_000.0);
        let acquisition = acquisition();
        let mut camera =
            MockCamera::new().with_exposure_range(ExposureRange::new(10.0, 1_000.0));
        let mut op = operator(RateChoice::Skip, IntensityChoice::Abort);

        let report = Session::new(&plan, &acquisition)
            .run(&mut camera, &mut op, &mut RecordingSink::default())
            .unwrap();

        assert_eq!(report.final_exposure_us, 1_000.0);
    }

    #[test]
    fn test_quit_at_intensity_prompt_grabs_nothing_before_acquisition() {
        let plan = plan(0);
        let acquisition = acquisition();
        let mut camera = MockCamera::new();
        let mut op = operator(rate(0.2), IntensityChoice::Abort);

        let report = Session::new(&plan, &acquisition)
            .run(&mut camera, &mut op, &mut RecordingSink::default())
            .unwrap();

        assert_eq!(report.exposure, ExposureOutcome::Aborted);
        assert_eq!(camera.grab_calls(), 0);
    }

    #[test]
    fn test_skip_at_rate_prompt() {
        let plan = plan(0);
        let acquisition = acquisition();
        let mut camera = MockCamera::new();
        let mut op = operator(RateChoice::Skip, IntensityChoice::Target(128));

        let report = Session::new(&plan, &acquisition)
            .run(&mut camera, &mut op, &mut RecordingSink::default())
            .unwrap();

        assert_eq!(report.exposure, ExposureOutcome::Skipped);
        assert_eq!(camera.grab_calls(), 0);
    }

    #[test]
    fn test_zero_setpoint_keeps_exposure_and_acquires() {
        let plan = plan(1);
        let acquisition = acquisition();
        let mut camera = MockCamera::new();
        let mut op = operator(rate(0.2), IntensityChoice::Target(0));
        let mut sink = RecordingSink::default();

        let report = Session::new(&plan, &acquisition)
            .run(&mut camera, &mut op, &mut sink)
            .unwrap();

        assert!(matches!(report.exposure, ExposureOutcome::Rejected(_)));
        assert_eq!(report.final_exposure_us, 20.0);
        assert_eq!(sink.names, vec!["2024-05-06_0.png"]);
    }

    #[test]
    fn test_adjusts_then_acquires() {
        let plan = plan(3);
        let acquisition = acquisition();
        let mut camera = MockCamera::new().with_fixed_intensity(125.0);
        let mut op = operator(rate(0.2), IntensityChoice::Target(128));
        let mut sink = RecordingSink::default();

        let report = Session::new(&plan, &acquisition)
            .run(&mut camera, &mut op, &mut sink)
            .unwrap();

        match report.exposure {
            ExposureOutcome::Adjusted(ref convergence) => assert!(convergence.converged),
            ref other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(report.acquisition.frames_written, 3);
        assert_eq!(camera.grab_calls(), 4);
    }

    #[test]
    fn test_report_survives_exposure_read_failure_after_acquisition() {
        let plan = SessionPlan {
            adjust_exposure: false,
            ..plan(2)
        };
        let acquisition = acquisition();
        let mut camera = MockCamera::new().failing_exposure_read_after(1);
        let mut op = operator(RateChoice::Skip, IntensityChoice::Abort);
        let mut sink = RecordingSink::default();

        let report = Session::new(&plan, &acquisition)
            .run(&mut camera, &mut op, &mut sink)
            .unwrap();

        assert_eq!(report.acquisition.frames_written, 2);
        assert_eq!(report.final_exposure_us, 20.0);
        assert_eq!(camera.close_calls(), 1);
    }

    #[test]
    fn test_closes_after_open_failure() {
        let plan = plan(3);
        let acquisition = acquisition();
        let mut camera = MockCamera::new().failing_open();
        let mut op = operator(RateChoice::Skip, IntensityChoice::Abort);

        let result = Session::new(&plan, &acquisition).run(
            &mut camera,
            &mut op,
            &mut RecordingSink::default(),
        );

        assert!(matches!(
            result,
            Err(SessionError::Camera(CameraError::DeviceNotFound(_)))
        ));
        assert!(!camera.is_open());
    }

    #[test]
    fn test_closes_after_configure_failure() {
        let plan = plan(3);
        let acquisition = acquisition();
        let mut camera = MockCamera::new().failing_configure();
        let mut op = operator(RateChoice::Skip, IntensityChoice::Abort);

        let result = Session::new(&plan, &acquisition).run(
            &mut camera,
            &mut op,
            &mut RecordingSink::default(),
        );

        assert!(matches!(
            result,
            Err(SessionError::Camera(CameraError::ConfigFailed(_)))
        ));
        assert!(!camera.is_open());
        assert_eq!(camera.close_calls(), 1);
    }

    #[test]
    fn test_closes_after_controller_failure() {
        let plan = plan(3);
        let acquisition = acquisition();
        let mut camera = MockCamera::new().failing_grab();
        let mut op = operator(rate(0.2), IntensityChoice::Target(128));

        let result = Session::new(&plan, &acquisition).run(
            &mut camera,
            &mut op,
            &mut RecordingSink::default(),
        );

        assert!(matches!(result, Err(SessionError::Exposure(_))));
        assert!(!camera.is_open());
        assert!(!camera.is_streaming());
    }

    #[test]
    fn test_closes_after_acquisition_failure() {
        let plan = SessionPlan {
            adjust_exposure: false,
            ..plan(3)
        };
        let acquisition = acquisition();
        let mut camera = MockCamera::new().failing_grab();
        let mut op = operator(RateChoice::Skip, IntensityChoice::Abort);

        let result = Session::new(&plan, &acquisition).run(
            &mut camera,
            &mut op,
            &mut RecordingSink::default(),
        );

        assert!(matches!(result, Err(SessionError::Acquisition(_))));
        assert_eq!(camera.close_calls(), 1);
    }

    #[test]
    fn test_stream_end_reported() {
        let plan = SessionPlan {
            adjust_exposure: false,
            ..plan(10)
        };
        let acquisition = acquisition();
        let mut camera = MockCamera::new().with_frame_limit(4);
        let mut op = operator(RateChoice::Skip, IntensityChoice::Abort);

        let report = Session::new(&plan, &acquisition)
            .run(&mut camera, &mut op, &mut RecordingSink::default())
            .unwrap();

        assert_eq!(report.acquisition.frames_written, 4);
        assert_eq!(report.acquisition.stop_reason, StopReason::StreamEnded);
    }
}
