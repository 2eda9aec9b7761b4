//! Configuration file format.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the reference behaviour: 25 controller samples, 100 ms grab timeouts,
//! 100 acquired frames written to the working directory.

use crate::capture::CaptureConfig;
use crate::exposure::StepPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Width or height is zero.
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    /// Start exposure is not a positive finite value.
    #[error("invalid exposure time: {0} us")]
    InvalidExposure(f64),
    /// A grab timeout of zero.
    #[error("{0} timeout must be greater than zero")]
    ZeroTimeout(&'static str),
    /// Relative tolerance outside (0, 1).
    #[error("tolerance {0} must lie in (0, 1)")]
    InvalidTolerance(f64),
    /// Suggested rate outside the prompt's range.
    #[error("suggested convergence rate {0} must lie in [0.01, 1]")]
    InvalidSuggestedRate(f64),
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[capture]` device settings.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// `[exposure]` controller settings.
    #[serde(default)]
    pub exposure: ExposureConfig,
    /// `[acquisition]` loop settings.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// `[output]` destinations.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Exposure controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureConfig {
    /// Run the exposure controller before acquiring.
    pub enabled: bool,
    /// Sample budget for one controller run.
    pub max_samples: u32,
    /// Grab timeout per sample, in milliseconds.
    pub timeout_ms: u64,
    /// Relative error at which the controller stops.
    pub tolerance: f64,
    /// Direction rule applied when a sample is brighter than the setpoint.
    pub step_policy: StepPolicy,
    /// Rate offered at the convergence-rate prompt.
    pub suggested_rate: f64,
    /// Intensity offered at the setpoint prompt.
    pub suggested_intensity: u8,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_samples: 25,
            timeout_ms: 100,
            tolerance: 0.05,
            step_policy: StepPolicy::default(),
            suggested_rate: 0.2,
            suggested_intensity: 128,
        }
    }
}

/// Acquisition loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Number of frames to write before stopping.
    pub max_frames: u32,
    /// Grab timeout per attempt, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_frames: 100,
            timeout_ms: 100,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving the PNG files.
    pub directory: PathBuf,
    /// File receiving run metrics in Prometheus text format, if any.
    pub metrics_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            metrics_file: None,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        let config: FileConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;

        if self.exposure.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("exposure"));
        }
        if self.acquisition.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("acquisition"));
        }
        let tolerance = self.exposure.tolerance;
        if !(tolerance > 0.0 && tolerance < 1.0) {
            return Err(ConfigError::InvalidTolerance(tolerance));
        }
        let rate = self.exposure.suggested_rate;
        if !(0.01..=1.0).contains(&rate) {
            return Err(ConfigError::InvalidSuggestedRate(rate));
        }
        Ok(())
    }
}
