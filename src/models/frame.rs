//! Frame data as it moves from a source into the pipeline.

use image::RgbImage;
use thiserror::Error;

/// Pixel layout of a raw frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    /// Native layout of most camera drivers.
    Bgr8,
    Rgba8,
    Gray8,
}

impl PixelFormat {
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame has zero dimension ({width}x{height})")]
    ZeroDimension { width: u32, height: u32 },
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// Frame as delivered by a source, before validation.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

/// Validated RGB8 frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn try_from_raw(raw: RawFrame) -> Result<Self, FrameError> {
        if raw.width == 0 || raw.height == 0 {
            return Err(FrameError::ZeroDimension {
                width: raw.width,
                height: raw.height,
            });
        }

        let pixels = raw.width as usize * raw.height as usize;
        let expected = pixels * raw.format.channels();
        if raw.data.len() != expected {
            return Err(FrameError::BufferSize {
                expected,
                actual: raw.data.len(),
            });
        }

        let rgb = match raw.format {
            PixelFormat::Rgb8 => raw.data,
            PixelFormat::Bgr8 => raw
                .data
                .chunks_exact(3)
                .flat_map(|bgr| [bgr[2], bgr[1], bgr[0]])
                .collect(),
            PixelFormat::Rgba8 => raw
                .data
                .chunks_exact(4)
                .flat_map(|rgba| [rgba[0], rgba[1], rgba[2]])
                .collect(),
            PixelFormat::Gray8 => raw.data.iter().flat_map(|&v| [v, v, v]).collect(),
        };

        let converted = rgb.len();
        let image = RgbImage::from_raw(raw.width, raw.height, rgb).ok_or(
            FrameError::BufferSize {
                expected: pixels * 3,
                actual: converted,
            },
        )?;

        Ok(Self {
            index: raw.index,
            image,
        })
    }
}

#[cfg(test)]
impl Frame {
    pub(crate) fn filled(index: u64, width: u32, height: u32, color: [u8; 3]) -> Self {
        Self {
            index,
            image: RgbImage::from_pixel(width, height, image::Rgb(color)),
        }
    }
}
