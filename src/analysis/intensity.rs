//! Frame brightness statistics.
//!
//! All values are reported on the 8-bit scale (0-255) whatever the pixel
//! format, so a setpoint chosen by the operator means the same thing for
//! Mono8 and Mono12 streams.

use crate::capture::{Frame, PixelFormat};

/// ITU-R BT.601 luma weights for R, G and B.
const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Brightness statistics for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityStats {
    /// Arithmetic mean of the single-channel intensity.
    pub mean: f64,
    /// Darkest pixel.
    pub min: f64,
    /// Brightest pixel.
    pub max: f64,
    /// Number of pixels analyzed.
    pub pixel_count: usize,
}

impl IntensityStats {
    /// Reduces the frame to single-channel intensity and summarizes it.
    ///
    /// Returns `None` for frames without pixels or whose buffer does not
    /// match their dimensions.
    pub fn analyze(frame: &Frame) -> Option<Self> {
        if frame.pixel_count() == 0 || !frame.is_valid() {
            return None;
        }

        let scale = 255.0 / f64::from(frame.format().max_value());
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        let mut visit = |value: f64| {
            sum += value;
            min = min.min(value);
            max = max.max(value);
        };

        match frame.format() {
            PixelFormat::Rgb8 => {
                for px in frame.samples().chunks_exact(3) {
                    visit(luma(px) * scale);
                }
            }
            _ => {
                for &sample in frame.samples() {
                    visit(f64::from(sample) * scale);
                }
            }
        }

        let pixel_count = frame.pixel_count();
        Some(Self {
            mean: sum / pixel_count as f64,
            min,
            max,
            pixel_count,
        })
    }
}

/// Mean single-channel intensity of the frame on the 0-255 scale.
pub fn mean_intensity(frame: &Frame) -> Option<f64> {
    IntensityStats::analyze(frame).map(|stats| stats.mean)
}

#[inline]
fn luma(px: &[u16]) -> f64 {
    px.iter()
        .zip(LUMA_WEIGHTS)
        .map(|(&c, w)| f64::from(c) * w)
        .sum()
}
