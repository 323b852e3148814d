//! Forward diffusion sampler over RGBA pixel grids.
//!
//! - [`PixelGrid`]: owned RGBA buffer with dimension checks
//! - [`ForwardSampler`]: the reparameterized Gaussian corruption
//! - [`noise`]: Box-Muller draws and byte/normalized range helpers

mod forward;
mod grid;
pub mod noise;

pub use forward::{AlphaPolicy, BlendDomain, ForwardSampler, NoiseAmplitude, SamplerOptions};
pub use grid::{PixelGrid, CHANNELS, COLOR_CHANNELS};
