//! Frame brightness analysis.
//!
//! Reduces frames to a single-channel intensity and summarizes it for the
//! exposure controller.

mod intensity;

pub use intensity::{mean_intensity, IntensityStats};
