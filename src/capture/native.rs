//! Hardware camera backend built on `nokhwa`.
//!
//! Only 8-bit luma output is available through this backend. The
//! underlying API has no grab timeout, so [`Camera::try_grab`] blocks until
//! the next frame. Frame read and decode errors count as empty grabs until
//! [`MAX_CONSECUTIVE_READ_ERRORS`] pile up in a row; any other backend
//! error, or a stream that closed underneath us, is a device failure.

use super::{Camera, CameraError, CaptureConfig, ExposureRange, Frame, GrabStrategy, PixelFormat};
use nokhwa::pixel_format::LumaFormat;
use nokhwa::utils::{
    CameraIndex, ControlValueDescription, ControlValueSetter, KnownCameraControl,
    RequestedFormat, RequestedFormatType,
};
use nokhwa::NokhwaError;
use std::time::Duration;

/// V4L2 absolute exposure is expressed in 100 us units.
const EXPOSURE_UNIT_US: f64 = 100.0;

/// `V4L2_CID_EXPOSURE_AUTO`.
const EXPOSURE_AUTO_CONTROL: u128 = 0x009a_0901;

/// `V4L2_EXPOSURE_MANUAL`.
const EXPOSURE_MODE_MANUAL: i64 = 1;

/// Read or decode errors in a row after which the stream counts as lost.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 5;

/// How a failed backend grab is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GrabFault {
    /// Report an empty grab.
    Transient,
    /// Report a device failure.
    Fatal,
}

/// Tracks consecutive failed grabs.
#[derive(Debug, Default)]
struct ReadFaults {
    consecutive: u32,
}

impl ReadFaults {
    fn record(&mut self, error: &NokhwaError, stream_open: bool) -> GrabFault {
        self.consecutive += 1;
        let transient_kind = matches!(
            error,
            NokhwaError::ReadFrameError(_) | NokhwaError::ProcessFrameError { .. }
        );
        if stream_open && transient_kind && self.consecutive < MAX_CONSECUTIVE_READ_ERRORS {
            GrabFault::Transient
        } else {
            GrabFault::Fatal
        }
    }

    fn clear(&mut self) {
        self.consecutive = 0;
    }
}

/// Camera backed by the platform's native capture API.
#[derive(Default)]
pub struct NativeCamera {
    device: Option<nokhwa::Camera>,
    sequence: u64,
    faults: ReadFaults,
}

impl NativeCamera {
    /// Creates an unopened camera.
    pub fn new() -> Self {
        Self::default()
    }

    fn device(&self) -> Result<&nokhwa::Camera, CameraError> {
        self.device.as_ref().ok_or(CameraError::NotInitialized)
    }

    fn device_mut(&mut self) -> Result<&mut nokhwa::Camera, CameraError> {
        self.device.as_mut().ok_or(CameraError::NotInitialized)
    }

    fn exposure_description(&self) -> Result<ControlValueDescription, CameraError> {
        let control = self
            .device()?
            .camera_control(KnownCameraControl::Exposure)
            .map_err(|e| CameraError::Unsupported(format!("exposure control: {e}")))?;
        Ok(control.description().clone())
    }
}

impl Camera for NativeCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        let requested =
            RequestedFormat::new::<LumaFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut device = nokhwa::Camera::new(CameraIndex::Index(config.device_id), requested)
            .map_err(|e| CameraError::OpenFailed(e.to_string()))?;

        if let Err(e) = request_manual_exposure(&mut device) {
            tracing::warn!(error = %e, "Auto-exposure may still be active; exposure writes can be ignored");
        }

        tracing::info!(
            device_id = config.device_id,
            name = %device.info().human_name(),
            "Native camera opened"
        );
        self.device = Some(device);
        self.sequence = 0;
        self.faults.clear();
        Ok(())
    }

    fn set_pixel_format(&mut self, format: PixelFormat) -> Result<(), CameraError> {
        self.device()?;
        match format {
            PixelFormat::Mono8 => Ok(()),
            other => Err(CameraError::Unsupported(format!("pixel format {other}"))),
        }
    }

    fn set_grab_strategy(&mut self, strategy: GrabStrategy) -> Result<(), CameraError> {
        self.device()?;
        if strategy != GrabStrategy::OneByOne {
            tracing::warn!(?strategy, "Backend always delivers frames in order");
        }
        Ok(())
    }

    fn exposure_range(&self) -> Result<ExposureRange, CameraError> {
        match self.exposure_description()? {
            ControlValueDescription::IntegerRange { min, max, .. } => Ok(ExposureRange::new(
                min as f64 * EXPOSURE_UNIT_US,
                max as f64 * EXPOSURE_UNIT_US,
            )),
            other => Err(CameraError::Unsupported(format!(
                "exposure control without range: {other:?}"
            ))),
        }
    }

    fn exposure_us(&self) -> Result<f64, CameraError> {
        match self.exposure_description()? {
            ControlValueDescription::IntegerRange { value, .. }
            | ControlValueDescription::Integer { value, .. } => {
                Ok(value as f64 * EXPOSURE_UNIT_US)
            }
            other => Err(CameraError::Unsupported(format!(
                "non-integer exposure control: {other:?}"
            ))),
        }
    }

    fn set_exposure_us(&mut self, exposure_us: f64) -> Result<(), CameraError> {
        let units = (exposure_us / EXPOSURE_UNIT_US).round() as i64;
        self.device_mut()?
            .set_camera_control(KnownCameraControl::Exposure, ControlValueSetter::Integer(units))
            .map_err(|e| CameraError::ConfigFailed(format!("set exposure: {e}")))
    }

    fn start_streaming(&mut self) -> Result<(), CameraError> {
        self.device_mut()?
            .open_stream()
            .map_err(|e| CameraError::ConfigFailed(format!("start stream: {e}")))
    }

    fn stop_streaming(&mut self) -> Result<(), CameraError> {
        match self.device.as_mut() {
            Some(device) if device.is_stream_open() => device
                .stop_stream()
                .map_err(|e| CameraError::ConfigFailed(format!("stop stream: {e}"))),
            _ => Ok(()),
        }
    }

    fn is_streaming(&self) -> bool {
        self.device
            .as_ref()
            .is_some_and(|device| device.is_stream_open())
    }

    fn try_grab(&mut self, _timeout: Duration) -> Result<Option<Frame>, CameraError> {
        let device = self.device.as_mut().ok_or(CameraError::NotInitialized)?;
        if !device.is_stream_open() {
            return Err(CameraError::NotStreaming);
        }

        let image = match device
            .frame()
            .and_then(|buffer| buffer.decode_image::<LumaFormat>())
        {
            Ok(image) => {
                self.faults.clear();
                image
            }
            Err(e) => match self.faults.record(&e, device.is_stream_open()) {
                GrabFault::Transient => {
                    tracing::debug!(
                        error = %e,
                        consecutive = self.faults.consecutive,
                        "Grab returned no frame"
                    );
                    return Ok(None);
                }
                GrabFault::Fatal => {
                    if device.is_stream_open() {
                        if let Err(stop) = device.stop_stream() {
                            tracing::warn!(error = %stop, "Failed to stop lost stream");
                        }
                    }
                    tracing::error!(
                        error = %e,
                        consecutive = self.faults.consecutive,
                        "Frame stream lost"
                    );
                    return Err(CameraError::CaptureFailed(e.to_string()));
                }
            },
        };

        self.sequence += 1;
        let (width, height) = image.dimensions();
        Ok(Some(Frame::mono8(
            image.as_raw(),
            width,
            height,
            self.sequence,
        )))
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn close(&mut self) {
        if let Err(e) = self.stop_streaming() {
            tracing::warn!(error = %e, "Failed to stop stream while closing");
        }
        if self.device.take().is_some() {
            tracing::info!("Native camera closed");
        }
    }
}

/// Control write that selects manual exposure.
fn manual_exposure_control() -> (KnownCameraControl, ControlValueSetter) {
    (
        KnownCameraControl::Other(EXPOSURE_AUTO_CONTROL),
        ControlValueSetter::Integer(EXPOSURE_MODE_MANUAL),
    )
}

/// Puts the device in manual exposure mode so exposure writes take effect.
fn request_manual_exposure(device: &mut nokhwa::Camera) -> Result<(), CameraError> {
    let (control, value) = manual_exposure_control();
    device
        .set_camera_control(control, value)
        .map_err(|e| CameraError::ConfigFailed(format!("disable auto-exposure: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nokhwa::utils::FrameFormat;

    fn read_error() -> NokhwaError {
        NokhwaError::ReadFrameError("VIDIOC_DQBUF".into())
    }

    #[test]
    fn test_manual_exposure_targets_auto_exposure_control() {
        let (control, value) = manual_exposure_control();
        assert!(matches!(control, KnownCameraControl::Other(0x009a_0901)));
        assert!(matches!(value, ControlValueSetter::Integer(1)));
    }

    #[test]
    fn test_isolated_read_error_is_empty_grab() {
        let mut faults = ReadFaults::default();
        assert_eq!(faults.record(&read_error(), true), GrabFault::Transient);
    }

    #[test]
    fn test_decode_error_is_empty_grab() {
        let mut faults = ReadFaults::default();
        let error = NokhwaError::ProcessFrameError {
            src: FrameFormat::MJPEG,
            destination: "Luma".into(),
            error: "truncated".into(),
        };
        assert_eq!(faults.record(&error, true), GrabFault::Transient);
    }

    #[test]
    fn test_read_error_on_closed_stream_is_fatal() {
        let mut faults = ReadFaults::default();
        assert_eq!(faults.record(&read_error(), false), GrabFault::Fatal);
    }

    #[test]
    fn test_other_backend_errors_are_fatal() {
        let mut faults = ReadFaults::default();
        let error = NokhwaError::GeneralError("device disconnected".into());
        assert_eq!(faults.record(&error, true), GrabFault::Fatal);
    }

    #[test]
    fn test_consecutive_read_errors_become_fatal() {
        let mut faults = ReadFaults::default();
        for _ in 1..MAX_CONSECUTIVE_READ_ERRORS {
            assert_eq!(faults.record(&read_error(), true), GrabFault::Transient);
        }
        assert_eq!(faults.record(&read_error(), true), GrabFault::Fatal);
    }

    #[test]
    fn test_successful_grab_resets_count() {
        let mut faults = ReadFaults::default();
        for _ in 1..MAX_CONSECUTIVE_READ_ERRORS {
            faults.record(&read_error(), true);
        }
        faults.clear();
        assert_eq!(faults.record(&read_error(), true), GrabFault::Transient);
    }
}
