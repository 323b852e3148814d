//! Image input/output glue.
//!
//! Decodes source images into letterboxed [`PixelGrid`](crate::sampler::PixelGrid)s
//! and writes noised grids back out as PNG.

pub mod letterbox;
pub mod png;

// Re-export commonly used items
pub use letterbox::{letterbox, letterbox_geometry, load_letterboxed, DEFAULT_IMAGE_SIZE};
pub use png::{encode_png, write_png};
