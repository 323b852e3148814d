//! Letterboxed image loading.
//!
//! Fits an arbitrary image into a square transparent canvas, preserving its
//! aspect ratio and centering it.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use tracing::debug;

use crate::error::{DiffusionError, Result};
use crate::sampler::PixelGrid;

/// Canvas edge length used by the visualizer.
pub const DEFAULT_IMAGE_SIZE: u32 = 256;

/// Placement of a scaled image inside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Computes the scaled size and offset of a `width x height` image centered
/// in a `size x size` canvas.
pub fn letterbox_geometry(width: u32, height: u32, size: u32) -> Placement {
    let scale = f64::min(
        size as f64 / width.max(1) as f64,
        size as f64 / height.max(1) as f64,
    );
    let scaled_w = ((width as f64 * scale).round() as u32).clamp(1, size);
    let scaled_h = ((height as f64 * scale).round() as u32).clamp(1, size);

    Placement {
        width: scaled_w,
        height: scaled_h,
        x: (size - scaled_w) / 2,
        y: (size - scaled_h) / 2,
    }
}

/// Letterboxes a decoded image into a `size x size` RGBA grid.
pub fn letterbox(image: &DynamicImage, size: u32) -> PixelGrid {
    let rgba = image.to_rgba8();
    let placement = letterbox_geometry(rgba.width(), rgba.height(), size);

    let scaled = if (placement.width, placement.height) == rgba.dimensions() {
        rgba
    } else {
        imageops::resize(&rgba, placement.width, placement.height, FilterType::Triangle)
    };

    let mut canvas = RgbaImage::new(size, size);
    imageops::replace(&mut canvas, &scaled, placement.x as i64, placement.y as i64);

    PixelGrid {
        width: size,
        height: size,
        data: canvas.into_raw(),
    }
}

/// Opens and decodes `path`, then letterboxes it into a `size x size` grid.
pub fn load_letterboxed(path: &Path, size: u32) -> Result<PixelGrid> {
    if size == 0 {
        return Err(DiffusionError::invalid_configuration("image size must be > 0"));
    }

    let image = image::open(path)
        .map_err(|e| DiffusionError::image_load_failed(path.display().to_string(), e))?;

    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        size,
        "decoded source image"
    );

    Ok(letterbox(&image, size))
}
