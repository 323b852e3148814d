//! Frame generation module.
//!
//! Ties the noise scheduler to the forward sampler to render noised frames.

pub mod pipeline;

// Re-export commonly used items
pub use pipeline::{make_rng, render_all_steps, render_step, NoisedFrame};
