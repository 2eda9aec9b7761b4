//! Frame persistence.

use super::SinkError;
use crate::capture::{Frame, PixelFormat};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use std::path::{Path, PathBuf};

/// Destination for acquired frames.
pub trait FrameSink {
    /// Persists `frame` under `name` and returns where it went.
    fn write(&mut self, name: &str, frame: &Frame) -> Result<PathBuf, SinkError>;
}

/// Writes frames as PNG files into a directory.
///
/// Samples are encoded as delivered: 8-bit formats as 8-bit PNG, Mono12
/// and Mono16 as 16-bit grayscale PNG without rescaling. Existing files
/// are overwritten.
#[derive(Debug, Clone)]
pub struct PngSink {
    directory: PathBuf,
}

impl PngSink {
    /// Writes into an existing `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Creates the directory if it does not exist yet.
    pub fn create(directory: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let sink = Self::new(directory);
        std::fs::create_dir_all(&sink.directory)?;
        Ok(sink)
    }

    /// Target directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl FrameSink for PngSink {
    fn write(&mut self, name: &str, frame: &Frame) -> Result<PathBuf, SinkError> {
        let path = self.directory.join(name);
        let (width, height) = (frame.width(), frame.height());
        let malformed = || SinkError::Malformed {
            width,
            height,
            samples: frame.samples().len(),
        };

        match frame.format() {
            PixelFormat::Mono8 => {
                let image = GrayImage::from_raw(width, height, narrow(frame.samples()))
                    .ok_or_else(malformed)?;
                image.save(&path)?;
            }
            PixelFormat::Mono12 | PixelFormat::Mono16 => {
                let image: ImageBuffer<Luma<u16>, Vec<u16>> =
                    ImageBuffer::from_raw(width, height, frame.samples().to_vec())
                        .ok_or_else(malformed)?;
                image.save(&path)?;
            }
            PixelFormat::Rgb8 => {
                let image = RgbImage::from_raw(width, height, narrow(frame.samples()))
                    .ok_or_else(malformed)?;
                image.save(&path)?;
            }
        }

        tracing::trace!(path = %path.display(), "Frame written");
        Ok(path)
    }
}

fn narrow(samples: &[u16]) -> Vec<u8> {
    samples.iter().map(|&s| s.min(255) as u8).collect()
}
