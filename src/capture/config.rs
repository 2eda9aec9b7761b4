//! Camera capture configuration.
//!
//! The exposure time is owned by the controller in [`crate::exposure`],
//! starting from the device minimum. Hardware backends switch the device to
//! manual exposure when they open it.

use super::PixelFormat;
use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// How queued frames are retrieved from the device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrabStrategy {
    /// Frames are retrieved one at a time, oldest first.
    #[default]
    OneByOne,
    /// Only the most recent frame is kept; older ones are dropped.
    LatestImageOnly,
}

/// Configuration applied to the camera before streaming starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index. Zero selects the first detected device.
    pub device_id: u32,
    /// Frame width in pixels (used by backends that negotiate a resolution).
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Sample format requested from the device.
    pub pixel_format: PixelFormat,
    /// Buffer retrieval strategy.
    pub grab_strategy: GrabStrategy,
    /// Exposure time to start from, in microseconds.
    /// `None` starts from the device minimum.
    pub start_exposure_us: Option<f64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            width: 640,
            height: 480,
            pixel_format: PixelFormat::Mono12,
            grab_strategy: GrabStrategy::OneByOne,
            start_exposure_us: None,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if let Some(exposure) = self.start_exposure_us {
            if !(exposure.is_finite() && exposure > 0.0) {
                return Err(ConfigError::InvalidExposure(exposure));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pixel_format, PixelFormat::Mono12);
        assert_eq!(config.grab_strategy, GrabStrategy::OneByOne);
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let mut config = CaptureConfig::default();
        config.width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_non_positive_start_exposure_invalid() {
        let mut config = CaptureConfig::default();
        config.start_exposure_us = Some(0.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidExposure(_))
        ));
    }
}
