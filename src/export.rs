use crate::enums::ImageFormat;

use image::{DynamicImage, ImageBuffer, Rgb};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported export format for {}, only OpenEXR (.exr) can be written", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("slice index {index} out of range for a volume of {count} slices")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("{width}x{height} image cannot hold {len} pixels")]
    Dimensions { width: u32, height: u32, len: usize },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Writes a single-channel float image in one container format.
pub trait ImageEncoder {
    fn format(&self) -> ImageFormat;

    /// `pixels` is row-major, `width * height` long, values in `[0, 1]`.
    fn encode(&self, path: &Path, width: u32, height: u32, pixels: &[f32]) -> Result<(), ExportError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExrEncoder;

impl ImageEncoder for ExrEncoder {
    fn format(&self) -> ImageFormat {
        ImageFormat::OpenExr
    }

    fn encode(&self, path: &Path, width: u32, height: u32, pixels: &[f32]) -> Result<(), ExportError> {
        // The EXR encoder only takes RGB(A) float data.
        let rgb: Vec<f32> = pixels.par_iter().flat_map_iter(|&v| [v, v, v]).collect();
        let buffer: ImageBuffer<Rgb<f32>, Vec<f32>> = ImageBuffer::from_raw(width, height, rgb)
            .ok_or(ExportError::Dimensions {
                width,
                height,
                len: pixels.len(),
            })?;
        DynamicImage::ImageRgb32F(buffer).save_with_format(path, image::ImageFormat::OpenExr)?;
        Ok(())
    }
}

pub fn encoder_for(format: ImageFormat) -> Box<dyn ImageEncoder> {
    match format {
        ImageFormat::OpenExr => Box::new(ExrEncoder),
    }
}
