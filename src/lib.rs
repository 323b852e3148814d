//! ddpm-forward: forward-diffusion noise schedules and pixel sampler.
//!
//! This library renders what an image looks like at any step of the DDPM
//! forward noising process: a cosine-family noise schedule produces the
//! cumulative signal fraction for a step, and the forward sampler blends the
//! source pixels with Gaussian noise accordingly.
//!
//! # Modules
//!
//! - [`schedule`]: Beta schedules and the NoiseScheduler
//! - [`sampler`]: PixelGrid and the ForwardSampler
//! - [`generation`]: Step rendering on top of the two
//! - [`imaging`]: Letterboxed image loading and PNG output
//! - [`config`]: Runtime configuration (VisualizerConfig)
//! - [`error`]: Error types and codes (DiffusionError, ErrorCode)
//! - [`rpc`]: JSON-RPC server over stdio
//!
//! # Example
//!
//! ```rust,ignore
//! use ddpm_forward::{
//!     generation::{make_rng, render_step},
//!     sampler::{ForwardSampler, PixelGrid},
//!     schedule::{NoiseScheduler, Preset},
//! };
//!
//! let scheduler = NoiseScheduler::new(Preset::Improved.config())?;
//! let sampler = ForwardSampler::default();
//! let source = PixelGrid::filled(64, 64, [200, 120, 40, 255]);
//!
//! let frame = render_step(&scheduler, &sampler, &source, 25, true, &mut make_rng(Some(42)))?;
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod imaging;
pub mod rpc;
pub mod sampler;
pub mod schedule;

// Re-export commonly used types at crate root for convenience
pub use config::VisualizerConfig;
pub use error::{DiffusionError, ErrorCode, Result};
pub use sampler::{AlphaPolicy, BlendDomain, ForwardSampler, PixelGrid, SamplerOptions};
pub use schedule::{NoiseScheduler, Preset, ScheduleConfig, ScheduleFamily, ScheduleSample};
