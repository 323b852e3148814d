//! PNG writer for noised grids.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, ImageOutputFormat, RgbaImage};

use crate::error::{DiffusionError, Result};
use crate::sampler::PixelGrid;

fn to_rgba_image(grid: &PixelGrid) -> Result<RgbaImage> {
    grid.validate()?;
    RgbaImage::from_raw(grid.width, grid.height, grid.data.clone())
        .ok_or_else(|| DiffusionError::dimension_mismatch(grid.width, grid.height, grid.data.len()))
}

/// Writes a grid to a PNG file.
pub fn write_png(grid: &PixelGrid, path: &Path) -> Result<()> {
    let image = to_rgba_image(grid)?;
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| DiffusionError::image_write_failed(format!("{}: {}", path.display(), e)))
}

/// Encodes a grid as an in-memory PNG.
pub fn encode_png(grid: &PixelGrid) -> Result<Vec<u8>> {
    let image = DynamicImage::ImageRgba8(to_rgba_image(grid)?);

    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)
        .map_err(|e| DiffusionError::image_write_failed(e.to_string()))?;

    Ok(buffer)
}
