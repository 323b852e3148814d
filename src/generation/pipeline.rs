//! Generation pipeline for noised frames.
//!
//! Looks up the schedule sample for a step and hands its cumulative alpha
//! to the forward sampler.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::sampler::{ForwardSampler, PixelGrid};
use crate::schedule::{NoiseScheduler, ScheduleSample};

/// One rendered step: the schedule values and the noised grid.
#[derive(Debug, Clone, Serialize)]
pub struct NoisedFrame {
    pub sample: ScheduleSample,
    #[serde(skip)]
    pub grid: PixelGrid,
}

/// Builds the default random source, seeded when `seed` is given.
pub fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Renders the noised grid for a single step.
///
/// With `terminal_pure_noise` set, the last step is replaced by uniform
/// random noise instead of the blend.
///
/// # Example
///
/// ```ignore
/// use ddpm_forward::generation::{make_rng, render_step};
///
/// let mut rng = make_rng(Some(42));
/// let frame = render_step(&scheduler, &sampler, &source, 3, true, &mut rng)?;
/// println!("alpha_cumprod = {}", frame.sample.alpha_cumprod);
/// ```
pub fn render_step<R: Rng + ?Sized>(
    scheduler: &NoiseScheduler,
    sampler: &ForwardSampler,
    source: &PixelGrid,
    step: u32,
    terminal_pure_noise: bool,
    rng: &mut R,
) -> Result<NoisedFrame> {
    let family = scheduler.config().family;
    if !family.drives_pixels() {
        warn!(
            family = family.as_str(),
            "schedule family is presentational; using it to corrupt pixels"
        );
    }

    let sample = scheduler.sample(step)?;
    let terminal = terminal_pure_noise && scheduler.is_terminal(step);
    let grid = sampler.sample(source, sample.alpha_cumprod, terminal, rng)?;

    debug!(step, terminal, alpha_cumprod = sample.alpha_cumprod, "rendered step");

    Ok(NoisedFrame { sample, grid })
}

/// Renders every step from 0 to `T - 1` with progress callback.
///
/// `on_progress` receives `(frames_rendered, frames_total)` after each step.
pub fn render_all_steps<R, F>(
    scheduler: &NoiseScheduler,
    sampler: &ForwardSampler,
    source: &PixelGrid,
    terminal_pure_noise: bool,
    rng: &mut R,
    on_progress: F,
) -> Result<Vec<NoisedFrame>>
where
    R: Rng + ?Sized,
    F: Fn(usize, usize),
{
    let total = scheduler.total_steps() as usize;
    let mut frames = Vec::with_capacity(total);

    for step in 0..scheduler.total_steps() {
        frames.push(render_step(
            scheduler,
            sampler,
            source,
            step,
            terminal_pure_noise,
            rng,
        )?);
        on_progress(frames.len(), total);
    }

    Ok(frames)
}
