//! Camera abstraction for frame capture.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and mock implementations for testing.

use super::{CaptureConfig, Frame, GrabStrategy, PixelFormat};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// No device at the requested index.
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    /// The device exists but could not be opened.
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    /// A setting was rejected by the device.
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    /// The device stopped delivering frames.
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    /// The camera was used before [`Camera::open`].
    #[error("camera not initialized")]
    NotInitialized,
    /// A grab was attempted without an open stream.
    #[error("camera is not streaming")]
    NotStreaming,
    /// The backend cannot provide the requested feature.
    #[error("unsupported by this camera: {0}")]
    Unsupported(String),
}

/// Device-defined exposure time bounds, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureRange {
    /// Shortest exposure the device accepts.
    pub min_us: f64,
    /// Longest exposure the device accepts.
    pub max_us: f64,
}

impl ExposureRange {
    /// Creates a range from its bounds.
    pub fn new(min_us: f64, max_us: f64) -> Self {
        Self { min_us, max_us }
    }

    /// Clamps an exposure time into the range.
    #[inline]
    pub fn clamp(&self, exposure_us: f64) -> f64 {
        exposure_us.clamp(self.min_us, self.max_us)
    }

    /// Returns true if the value lies within the range.
    #[inline]
    pub fn contains(&self, exposure_us: f64) -> bool {
        (self.min_us..=self.max_us).contains(&exposure_us)
    }
}

/// Trait for camera implementations.
///
/// The handle is owned by the caller and passed explicitly to the exposure
/// controller and the acquisition loop; implementations hold the only copy
/// of the exposure time.
pub trait Camera {
    /// Opens and initializes the camera with the given configuration.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError>;

    /// Selects the sample format delivered by subsequent grabs.
    fn set_pixel_format(&mut self, format: PixelFormat) -> Result<(), CameraError>;

    /// Selects how queued frames are retrieved.
    fn set_grab_strategy(&mut self, strategy: GrabStrategy) -> Result<(), CameraError>;

    /// Returns the exposure bounds supported by the device.
    fn exposure_range(&self) -> Result<ExposureRange, CameraError>;

    /// Returns the current exposure time in microseconds.
    fn exposure_us(&self) -> Result<f64, CameraError>;

    /// Sets the exposure time in microseconds.
    fn set_exposure_us(&mut self, exposure_us: f64) -> Result<(), CameraError>;

    /// Starts the frame stream.
    fn start_streaming(&mut self) -> Result<(), CameraError>;

    /// Stops the frame stream. Stopping an idle camera is a no-op.
    fn stop_streaming(&mut self) -> Result<(), CameraError>;

    /// Returns true while the device is delivering frames.
    fn is_streaming(&self) -> bool;

    /// Waits up to `timeout` for the next frame.
    ///
    /// A timeout or a transient failed grab yields `Ok(None)`; errors are
    /// reserved for device failures. Callers check [`Camera::is_streaming`]
    /// before calling.
    fn try_grab(&mut self, timeout: Duration) -> Result<Option<Frame>, CameraError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Closes the camera and releases resources. Closing twice is a no-op.
    fn close(&mut self);
}

/// Mock camera that renders uniform frames whose brightness follows the
/// exposure time.
///
/// Intensity on the 0-255 scale is `exposure_us * response`, saturating at
/// full scale, so the exposure controller can be exercised without
/// hardware. Timeouts return immediately instead of blocking.
#[derive(Debug)]
pub struct MockCamera {
    config: Option<CaptureConfig>,
    format: PixelFormat,
    strategy: GrabStrategy,
    range: ExposureRange,
    exposure_us: f64,
    response: f64,
    fixed_intensity: Option<f64>,
    streaming: bool,
    sequence: u64,
    leading_timeouts: usize,
    always_timeout: bool,
    frame_limit: Option<usize>,
    frames_delivered: usize,
    fail_open: bool,
    fail_configure: bool,
    fail_grab: bool,
    exposure_read_limit: Option<usize>,
    grab_calls: usize,
    close_calls: usize,
}

impl Default for MockCamera {
    fn default() -> Self {
        Self {
            config: None,
            format: PixelFormat::Mono8,
            strategy: GrabStrategy::OneByOne,
            range: ExposureRange::new(20.0, 1_000_000.0),
            exposure_us: 20.0,
            response: 0.01,
            fixed_intensity: None,
            streaming: false,
            sequence: 0,
            leading_timeouts: 0,
            always_timeout: false,
            frame_limit: None,
            frames_delivered: 0,
            fail_open: false,
            fail_configure: false,
            fail_grab: false,
            exposure_read_limit: None,
            grab_calls: 0,
            close_calls: 0,
        }
    }
}

impl MockCamera {
    /// Creates a closed mock camera with the default response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the intensity gained per microsecond of exposure.
    pub fn with_response(mut self, response: f64) -> Self {
        self.response = response;
        self
    }

    /// Overrides the exposure bounds reported by the device.
    pub fn with_exposure_range(mut self, range: ExposureRange) -> Self {
        self.range = range;
        self.exposure_us = range.min_us;
        self
    }

    /// Renders every frame at the given intensity regardless of exposure.
    pub fn with_fixed_intensity(mut self, intensity: f64) -> Self {
        self.fixed_intensity = Some(intensity);
        self
    }

    /// Makes the first `count` grabs time out.
    pub fn with_leading_timeouts(mut self, count: usize) -> Self {
        self.leading_timeouts = count;
        self
    }

    /// Makes every grab time out.
    pub fn always_timing_out(mut self) -> Self {
        self.always_timeout = true;
        self
    }

    /// Stops streaming once `count` frames have been delivered.
    pub fn with_frame_limit(mut self, count: usize) -> Self {
        self.frame_limit = Some(count);
        self
    }

    /// Makes [`Camera::open`] fail.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Makes pixel format and grab strategy configuration fail.
    pub fn failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    /// Makes every grab fail with a device error.
    pub fn failing_grab(mut self) -> Self {
        self.fail_grab = true;
        self
    }

    /// Makes exposure reads fail once `grabs` grabs have been made.
    pub fn failing_exposure_read_after(mut self, grabs: usize) -> Self {
        self.exposure_read_limit = Some(grabs);
        self
    }

    /// Number of [`Camera::try_grab`] calls so far.
    pub fn grab_calls(&self) -> usize {
        self.grab_calls
    }

    /// Number of [`Camera::close`] calls that released an open device.
    pub fn close_calls(&self) -> usize {
        self.close_calls
    }

    /// Currently selected grab strategy.
    pub fn grab_strategy(&self) -> GrabStrategy {
        self.strategy
    }

    /// Currently selected pixel format.
    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn current_intensity(&self) -> f64 {
        self.fixed_intensity
            .unwrap_or(self.exposure_us * self.response)
            .clamp(0.0, 255.0)
    }

    fn render(&mut self, config: &CaptureConfig) -> Frame {
        let intensity = self.current_intensity();
        let max = f64::from(self.format.max_value());
        let value = (intensity / 255.0 * max).round() as u16;

        self.sequence += 1;
        Frame::filled(value, config.width, config.height, self.format, self.sequence)
    }

    fn ensure_open(&self) -> Result<(), CameraError> {
        if self.config.is_some() {
            Ok(())
        } else {
            Err(CameraError::NotInitialized)
        }
    }
}

impl Camera for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        if self.fail_open {
            return Err(CameraError::DeviceNotFound(format!(
                "no mock device at index {}",
                config.device_id
            )));
        }
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        self.config = Some(config.clone());
        self.sequence = 0;
        tracing::info!(device_id = config.device_id, "MockCamera opened");
        Ok(())
    }

    fn set_pixel_format(&mut self, format: PixelFormat) -> Result<(), CameraError> {
        self.ensure_open()?;
        if self.fail_configure {
            return Err(CameraError::ConfigFailed(format!(
                "pixel format {format} rejected"
            )));
        }
        self.format = format;
        Ok(())
    }

    fn set_grab_strategy(&mut self, strategy: GrabStrategy) -> Result<(), CameraError> {
        self.ensure_open()?;
        if self.fail_configure {
            return Err(CameraError::ConfigFailed(format!(
                "grab strategy {strategy:?} rejected"
            )));
        }
        self.strategy = strategy;
        Ok(())
    }

    fn exposure_range(&self) -> Result<ExposureRange, CameraError> {
        self.ensure_open()?;
        Ok(self.range)
    }

    fn exposure_us(&self) -> Result<f64, CameraError> {
        self.ensure_open()?;
        if self
            .exposure_read_limit
            .is_some_and(|limit| self.grab_calls >= limit)
        {
            return Err(CameraError::CaptureFailed(
                "mock exposure control lost".into(),
            ));
        }
        Ok(self.exposure_us)
    }

    fn set_exposure_us(&mut self, exposure_us: f64) -> Result<(), CameraError> {
        self.ensure_open()?;
        if !self.range.contains(exposure_us) {
            return Err(CameraError::ConfigFailed(format!(
                "exposure {exposure_us} us outside [{}, {}]",
                self.range.min_us, self.range.max_us
            )));
        }
        self.exposure_us = exposure_us;
        Ok(())
    }

    fn start_streaming(&mut self) -> Result<(), CameraError> {
        self.ensure_open()?;
        self.streaming = true;
        self.frames_delivered = 0;
        Ok(())
    }

    fn stop_streaming(&mut self) -> Result<(), CameraError> {
        self.streaming = false;
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn try_grab(&mut self, _timeout: Duration) -> Result<Option<Frame>, CameraError> {
        let config = self.config.clone().ok_or(CameraError::NotInitialized)?;
        if !self.streaming {
            return Err(CameraError::NotStreaming);
        }
        self.grab_calls += 1;

        if self.fail_grab {
            return Err(CameraError::CaptureFailed("mock device disconnected".into()));
        }
        if self.always_timeout || self.grab_calls <= self.leading_timeouts {
            return Ok(None);
        }

        let frame = self.render(&config);
        self.frames_delivered += 1;
        if self.frame_limit.is_some_and(|limit| self.frames_delivered >= limit) {
            self.streaming = false;
        }
        Ok(Some(frame))
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        if self.config.take().is_some() {
            self.streaming = false;
            self.close_calls += 1;
            tracing::info!("MockCamera closed");
        }
    }
}
