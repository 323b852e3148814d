//! Noise schedule engine.
//!
//! Provides the closed-form beta schedules used by the forward process:
//! - [`ScheduleFamily::PlainCosine`]: `max_beta * (1 - cos(u * pi / 2))`
//! - [`ScheduleFamily::OffsetCosineClipped`]: improved-DDPM cosine, clipped
//! - [`ScheduleFamily::DualScaledCosine`]: presentational noise level

mod family;
mod scheduler;

pub use family::{
    Denominator, NoiseBounds, Preset, ScheduleConfig, ScheduleFamily, DEFAULT_CLIP_MAX,
    DEFAULT_CLIP_MIN, DEFAULT_OFFSET, MAX_TOTAL_STEPS,
};
pub use scheduler::{NoiseScheduler, ScheduleSample, ScheduleTable};
