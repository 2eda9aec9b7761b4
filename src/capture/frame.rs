//! Frame type representing a grabbed image with metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Sample layout delivered by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Single channel, 8 bits per sample.
    Mono8,
    /// Single channel, 12 significant bits per sample.
    Mono12,
    /// Single channel, 16 bits per sample.
    Mono16,
    /// Three interleaved channels (R, G, B), 8 bits each.
    Rgb8,
}

impl PixelFormat {
    /// Number of interleaved channels per pixel.
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            _ => 1,
        }
    }

    /// Significant bits per sample.
    #[inline]
    pub fn bit_depth(self) -> u32 {
        match self {
            PixelFormat::Mono8 | PixelFormat::Rgb8 => 8,
            PixelFormat::Mono12 => 12,
            PixelFormat::Mono16 => 16,
        }
    }

    /// Largest representable sample value.
    #[inline]
    pub fn max_value(self) -> u16 {
        ((1u32 << self.bit_depth()) - 1) as u16
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Mono8 => "Mono8",
            PixelFormat::Mono12 => "Mono12",
            PixelFormat::Mono16 => "Mono16",
            PixelFormat::Rgb8 => "RGB8",
        };
        f.write_str(name)
    }
}

/// A single grabbed frame.
///
/// Samples are stored widened to `u16` regardless of the pixel format so
/// 8, 12 and 16 bit sources share one buffer type. Multi-channel formats
/// are stored interleaved, row-major.
#[derive(Clone)]
pub struct Frame {
    samples: Vec<u16>,
    width: u32,
    height: u32,
    format: PixelFormat,
    timestamp: Instant,
    sequence: u64,
}

impl Frame {
    /// Creates a new frame with the given parameters.
    pub fn new(
        samples: Vec<u16>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Self {
        Self {
            samples,
            width,
            height,
            format,
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Creates an 8-bit single channel frame.
    pub fn mono8(pixels: &[u8], width: u32, height: u32, sequence: u64) -> Self {
        let samples = pixels.iter().map(|&p| u16::from(p)).collect();
        Self::new(samples, width, height, PixelFormat::Mono8, sequence)
    }

    /// Creates a frame where every sample holds `value`.
    pub fn filled(value: u16, width: u32, height: u32, format: PixelFormat, sequence: u64) -> Self {
        let len = (width as usize) * (height as usize) * format.channels();
        Self::new(vec![value; len], width, height, format, sequence)
    }

    /// Returns the raw samples.
    #[inline]
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Consumes the frame and returns its samples.
    pub fn into_samples(self) -> Vec<u16> {
        self.samples
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sample layout.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Returns the grab timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the sequence number assigned by the camera.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Validates that the sample buffer size matches dimensions and format.
    pub fn is_valid(&self) -> bool {
        self.samples.len() == self.pixel_count() * self.format.channels()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("samples", &self.samples.len())
            .finish()
    }
}
