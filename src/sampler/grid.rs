//! RGBA pixel grid exchanged with the image glue.

use ndarray::ArrayView3;

use crate::error::{DiffusionError, Result};

/// Number of byte channels per pixel (R, G, B, A).
pub const CHANNELS: usize = 4;

/// Number of color channels that receive noise.
pub const COLOR_CHANNELS: usize = 3;

/// Row-major RGBA buffer of `width * height` pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelGrid {
    /// Creates a fully transparent black grid.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0, 0, 0, 0])
    }

    /// Creates a grid with every pixel set to `rgba`.
    ///
    /// # Panics
    ///
    /// Panics if `width * height * 4` does not fit in `usize`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width as usize)
            .checked_mul(height as usize)
            .filter(|&n| byte_len(n).is_some())
            .unwrap_or_else(|| panic!("grid {}x{} is too large", width, height));
        Self {
            width,
            height,
            data: rgba.repeat(pixels),
        }
    }

    /// Wraps an existing buffer, checking it against the declared dimensions.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let grid = Self {
            width,
            height,
            data,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Checks that the buffer holds exactly `width * height` RGBA pixels.
    pub fn validate(&self) -> Result<()> {
        if expected_len(self.width, self.height) != Some(self.data.len()) {
            return Err(DiffusionError::dimension_mismatch(
                self.width,
                self.height,
                self.data.len(),
            ));
        }
        Ok(())
    }

    /// Returns the number of pixels, saturating at `usize::MAX`.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Returns the RGBA value at `(x, y)`, if inside the grid.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let px = self.data.get(i..i + CHANNELS)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Returns true if both grids share width and height.
    pub fn same_dimensions(&self, other: &PixelGrid) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Returns a `(height, width, 4)` view of the buffer.
    pub fn view(&self) -> Result<ArrayView3<'_, u8>> {
        self.validate()?;
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .map_err(|_| DiffusionError::dimension_mismatch(self.width, self.height, self.data.len()))
    }
}

fn byte_len(pixels: usize) -> Option<usize> {
    pixels.checked_mul(CHANNELS)
}

/// Buffer length for a `width x height` grid, or None on overflow.
pub fn expected_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(byte_len)
}
