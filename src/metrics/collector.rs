//! Metrics collection and registry.

use crate::exposure::ConvergenceReport;
use crate::session::{ExposureOutcome, SessionReport};
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    /// The metrics file could not be written.
    #[error("failed to write metrics file: {0}")]
    Io(#[from] std::io::Error),
}

/// A snapshot of run state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Frames written by the acquisition loop.
    pub frames_written: u64,
    /// Grab timeouts across controller and acquisition.
    pub grab_timeouts: u64,
    /// Samples consumed by the exposure controller.
    pub controller_samples: u64,
    /// Exposure time left on the device, in microseconds.
    pub exposure_us: f64,
    /// Whether the controller converged.
    pub converged: bool,
    /// Mean intensity of the last controller sample.
    pub last_mean_intensity: Option<f64>,
    /// Wall-clock duration of the acquisition loop.
    pub acquisition_seconds: f64,
}

/// Prometheus metrics registry for capture runs.
pub struct MetricsRegistry {
    registry: Registry,

    frames_written_total: IntCounter,
    grab_timeouts_total: IntCounter,
    controller_samples_total: IntCounter,

    exposure_time_us: Gauge,
    converged: IntGauge,
    last_mean_intensity: Gauge,
    acquisition_seconds: Gauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all capture metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_written_total = IntCounter::new(
            "exposure_capture_frames_written_total",
            "Total number of frames written to disk",
        )?;
        let grab_timeouts_total = IntCounter::new(
            "exposure_capture_grab_timeouts_total",
            "Total number of grabs that returned no frame",
        )?;
        let controller_samples_total = IntCounter::new(
            "exposure_capture_controller_samples_total",
            "Total number of samples consumed by the exposure controller",
        )?;
        let exposure_time_us = Gauge::new(
            "exposure_capture_exposure_time_us",
            "Exposure time on the device in microseconds",
        )?;
        let converged = IntGauge::new(
            "exposure_capture_converged",
            "Whether the exposure controller converged (1=yes, 0=no)",
        )?;
        let last_mean_intensity = Gauge::new(
            "exposure_capture_last_mean_intensity",
            "Mean intensity of the last controller sample (0-255)",
        )?;
        let acquisition_seconds = Gauge::new(
            "exposure_capture_acquisition_seconds",
            "Wall-clock duration of the acquisition loop",
        )?;

        registry.register(Box::new(frames_written_total.clone()))?;
        registry.register(Box::new(grab_timeouts_total.clone()))?;
        registry.register(Box::new(controller_samples_total.clone()))?;
        registry.register(Box::new(exposure_time_us.clone()))?;
        registry.register(Box::new(converged.clone()))?;
        registry.register(Box::new(last_mean_intensity.clone()))?;
        registry.register(Box::new(acquisition_seconds.clone()))?;

        Ok(Self {
            registry,
            frames_written_total,
            grab_timeouts_total,
            controller_samples_total,
            exposure_time_us,
            converged,
            last_mean_intensity,
            acquisition_seconds,
        })
    }

    /// Updates all metrics from a snapshot of run state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        // For counters, we need to increment by the difference
        advance(&self.frames_written_total, snapshot.frames_written);
        advance(&self.grab_timeouts_total, snapshot.grab_timeouts);
        advance(&self.controller_samples_total, snapshot.controller_samples);

        self.exposure_time_us.set(snapshot.exposure_us);
        self.converged.set(i64::from(snapshot.converged));
        if let Some(intensity) = snapshot.last_mean_intensity {
            self.last_mean_intensity.set(intensity);
        }
        self.acquisition_seconds.set(snapshot.acquisition_seconds);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Writes the text encoding to `path`, replacing any previous content.
    pub fn write_to(&self, path: impl AsRef<std::path::Path>) -> Result<(), MetricsError> {
        std::fs::write(path, self.encode()?)?;
        Ok(())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

impl MetricsSnapshot {
    /// Creates a snapshot from a completed session.
    pub fn from_report(report: &SessionReport) -> Self {
        let convergence: Option<&ConvergenceReport> = match &report.exposure {
            ExposureOutcome::Adjusted(convergence) => Some(convergence),
            _ => None,
        };

        Self {
            frames_written: u64::from(report.acquisition.frames_written),
            grab_timeouts: report.acquisition.timeouts
                + convergence.map_or(0, |c| u64::from(c.timeouts)),
            controller_samples: convergence.map_or(0, |c| u64::from(c.samples)),
            exposure_us: report.final_exposure_us,
            converged: convergence.is_some_and(|c| c.converged),
            last_mean_intensity: convergence.and_then(|c| c.last_intensity),
            acquisition_seconds: report.acquisition.elapsed.as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{AcquisitionReport, StopReason};
    use std::time::Duration;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            frames_written: 3,
            grab_timeouts: 2,
            controller_samples: 7,
            exposure_us: 1500.0,
            converged: true,
            last_mean_intensity: Some(126.0),
            acquisition_seconds: 0.5,
        };

        registry.update(&snapshot);
        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("exposure_capture_frames_written_total 3"));
        assert!(output.contains("exposure_capture_grab_timeouts_total 2"));
        assert!(output.contains("exposure_capture_converged 1"));
    }

    #[test]
    fn test_snapshot_from_report() {
        let report = SessionReport {
            exposure: ExposureOutcome::Adjusted(ConvergenceReport {
                final_exposure_us: 900.0,
                converged: false,
                samples: 25,
                timeouts: 5,
                last_intensity: Some(80.0),
            }),
            acquisition: AcquisitionReport {
                frames_written: 10,
                timeouts: 1,
                files: Vec::new(),
                elapsed: Duration::from_secs(2),
                stop_reason: StopReason::FrameBudget,
            },
            final_exposure_us: 900.0,
        };

        let snapshot = MetricsSnapshot::from_report(&report);

        assert_eq!(snapshot.frames_written, 10);
        assert_eq!(snapshot.grab_timeouts, 6);
        assert_eq!(snapshot.controller_samples, 25);
        assert!(!snapshot.converged);
        assert_eq!(snapshot.last_mean_intensity, Some(80.0));
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.prom");
        let registry = MetricsRegistry::new().unwrap();

        registry.write_to(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("exposure_capture_frames_written_total"));
    }
}
