//! Numeric helpers for the forward sampler.

use std::f64::consts::TAU;

use rand::Rng;
use rand_distr::{Distribution, Open01};

/// Draws one standard normal variate with the Box-Muller transform.
///
/// Consumes two fresh uniforms from the open interval (0, 1), so `ln(u1)`
/// is always finite.
pub fn box_muller<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = Open01.sample(rng);
    let u2: f64 = Open01.sample(rng);
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// Draws a uniformly distributed byte in `[0, 255]`.
pub fn uniform_byte<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.gen()
}

/// Maps a byte value from `[0, 255]` to `[-1, 1]`.
pub fn to_normalized(value: f64) -> f64 {
    value / 127.5 - 1.0
}

/// Maps a value from `[-1, 1]` back to `[0, 255]` (unclamped).
pub fn from_normalized(value: f64) -> f64 {
    (value + 1.0) * 127.5
}

/// Clamps to `[0, 255]` and rounds to the nearest byte.
pub fn clamp_to_byte(value: f64) -> u8 {
    value.clamp(0.0, 255.0).round() as u8
}
