//! Schedule families and the immutable schedule configuration.

use serde::{Deserialize, Serialize};

use crate::error::{DiffusionError, Result};

/// Default offset `s` for the offset-cosine families.
pub const DEFAULT_OFFSET: f64 = 0.008;

/// Default lower clip bound for clipped betas.
pub const DEFAULT_CLIP_MIN: f64 = 1e-4;

/// Default upper clip bound for clipped betas.
pub const DEFAULT_CLIP_MAX: f64 = 0.9999;

/// Largest step count accepted.
pub const MAX_TOTAL_STEPS: u32 = 1000;

/// Which value normalizes the step index into `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Denominator {
    /// `u = t / T`; the last step never reaches `u = 1`.
    #[default]
    TotalSteps,
    /// `u = t / (T - 1)`; the last step lands exactly on `u = 1`.
    TotalStepsMinusOne,
}

impl Denominator {
    /// Resolves the denominator for a schedule of `total_steps` steps.
    pub fn resolve(&self, total_steps: u32) -> u32 {
        match self {
            Denominator::TotalSteps => total_steps,
            Denominator::TotalStepsMinusOne => total_steps.saturating_sub(1),
        }
    }

    /// Parses a denominator from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "t" | "total" | "total_steps" => Some(Denominator::TotalSteps),
            "t_minus_1" | "t_minus_one" | "total_steps_minus_one" => {
                Some(Denominator::TotalStepsMinusOne)
            }
            _ => None,
        }
    }
}

/// Beta schedule formula family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleFamily {
    /// `beta(t) = max_beta * (1 - cos(u * pi / 2))`.
    PlainCosine {
        max_beta: f64,
        #[serde(default)]
        denominator: Denominator,
    },

    /// Improved-DDPM cosine schedule: betas from the ratio of consecutive
    /// closed-form cumulative values, clipped to `[clip_min, clip_max]`.
    OffsetCosineClipped {
        offset: f64,
        #[serde(default)]
        denominator: Denominator,
        #[serde(default = "default_clip_min")]
        clip_min: f64,
        #[serde(default = "default_clip_max")]
        clip_max: f64,
    },

    /// `beta(t) = 1 - f(t / T) / f(0)`, unclipped. Drives a presentational
    /// noise level rather than pixel corruption.
    DualScaledCosine { offset: f64 },
}

fn default_clip_min() -> f64 {
    DEFAULT_CLIP_MIN
}

fn default_clip_max() -> f64 {
    DEFAULT_CLIP_MAX
}

impl ScheduleFamily {
    /// Returns the string name of this family.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleFamily::PlainCosine { .. } => "plain_cosine",
            ScheduleFamily::OffsetCosineClipped { .. } => "offset_cosine_clipped",
            ScheduleFamily::DualScaledCosine { .. } => "dual_scaled_cosine",
        }
    }

    /// Returns true if this family is meant to corrupt pixels.
    pub fn drives_pixels(&self) -> bool {
        !matches!(self, ScheduleFamily::DualScaledCosine { .. })
    }

    /// Returns true if this family has a `max_beta` parameter.
    pub fn uses_max_beta(&self) -> bool {
        matches!(self, ScheduleFamily::PlainCosine { .. })
    }

    /// Returns true if this family has an offset `s` parameter.
    pub fn uses_offset(&self) -> bool {
        !self.uses_max_beta()
    }

    /// Returns true if this family has a selectable denominator.
    pub fn uses_denominator(&self) -> bool {
        self.drives_pixels()
    }

    /// Returns the effective step denominator `T'`.
    pub fn denominator(&self, total_steps: u32) -> u32 {
        match self {
            ScheduleFamily::PlainCosine { denominator, .. }
            | ScheduleFamily::OffsetCosineClipped { denominator, .. } => {
                denominator.resolve(total_steps)
            }
            ScheduleFamily::DualScaledCosine { .. } => total_steps,
        }
    }
}

/// Bounds for the normalized noise-level presentation mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseBounds {
    pub min_noise: f64,
    pub max_noise: f64,
}

/// Immutable schedule configuration for one visualization session.
///
/// Replace the whole value to change schedule; it is never patched in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Number of diffusion steps `T` (must be > 1).
    pub total_steps: u32,

    /// Formula family and its parameters.
    pub family: ScheduleFamily,

    /// Optional bounds that switch `noise_level` to the normalized mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_bounds: Option<NoiseBounds>,
}

impl ScheduleConfig {
    /// Plain cosine schedule.
    pub fn plain_cosine(total_steps: u32, max_beta: f64, denominator: Denominator) -> Self {
        Self {
            total_steps,
            family: ScheduleFamily::PlainCosine {
                max_beta,
                denominator,
            },
            noise_bounds: None,
        }
    }

    /// Offset cosine schedule with the default clip bounds.
    pub fn offset_cosine(total_steps: u32, offset: f64, denominator: Denominator) -> Self {
        Self {
            total_steps,
            family: ScheduleFamily::OffsetCosineClipped {
                offset,
                denominator,
                clip_min: DEFAULT_CLIP_MIN,
                clip_max: DEFAULT_CLIP_MAX,
            },
            noise_bounds: None,
        }
    }

    /// Dual-scaled cosine schedule.
    pub fn dual_scaled_cosine(total_steps: u32, offset: f64) -> Self {
        Self {
            total_steps,
            family: ScheduleFamily::DualScaledCosine { offset },
            noise_bounds: None,
        }
    }

    /// Returns a copy using the normalized noise-level mode.
    pub fn with_noise_bounds(mut self, min_noise: f64, max_noise: f64) -> Self {
        self.noise_bounds = Some(NoiseBounds {
            min_noise,
            max_noise,
        });
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.total_steps <= 1 {
            return Err(DiffusionError::invalid_configuration(format!(
                "total_steps must be > 1, got {}",
                self.total_steps
            )));
        }
        if self.total_steps > MAX_TOTAL_STEPS {
            return Err(DiffusionError::invalid_configuration(format!(
                "total_steps too high: {} (max {})",
                self.total_steps, MAX_TOTAL_STEPS
            )));
        }

        if self.family.denominator(self.total_steps) == 0 {
            return Err(DiffusionError::invalid_configuration(
                "step denominator resolves to 0",
            ));
        }

        match self.family {
            ScheduleFamily::PlainCosine { max_beta, .. } => {
                if !max_beta.is_finite() || !(0.0..1.0).contains(&max_beta) {
                    return Err(DiffusionError::invalid_configuration(format!(
                        "max_beta must be in [0, 1), got {}",
                        max_beta
                    )));
                }
            }
            ScheduleFamily::OffsetCosineClipped {
                offset,
                clip_min,
                clip_max,
                ..
            } => {
                check_offset(offset)?;
                let in_range = clip_min.is_finite()
                    && clip_max.is_finite()
                    && clip_min >= 0.0
                    && clip_max < 1.0
                    && clip_min <= clip_max;
                if !in_range {
                    return Err(DiffusionError::invalid_configuration(format!(
                        "clip bounds must satisfy 0 <= min <= max < 1, got [{}, {}]",
                        clip_min, clip_max
                    )));
                }
            }
            ScheduleFamily::DualScaledCosine { offset } => check_offset(offset)?,
        }

        if let Some(bounds) = self.noise_bounds {
            let ok = bounds.min_noise.is_finite()
                && bounds.max_noise.is_finite()
                && bounds.min_noise <= bounds.max_noise;
            if !ok {
                return Err(DiffusionError::invalid_configuration(format!(
                    "noise bounds must be finite with min <= max, got [{}, {}]",
                    bounds.min_noise, bounds.max_noise
                )));
            }
        }

        Ok(())
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Preset::default().config()
    }
}

fn check_offset(offset: f64) -> Result<()> {
    if !offset.is_finite() || offset < 0.0 {
        return Err(DiffusionError::invalid_configuration(format!(
            "offset must be finite and >= 0, got {}",
            offset
        )));
    }
    Ok(())
}

/// Named schedule presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Ten steps of plain cosine with max_beta 0.02.
    #[default]
    Classic,
    /// Fifty steps of plain cosine reaching max_beta 0.999 at the last step.
    Steep,
    /// Fifty steps of the clipped improved-DDPM cosine schedule.
    Improved,
    /// Fifty steps of the dual-scaled cosine noise level in [0, 1].
    NoiseLevel,
}

impl Preset {
    /// Parses a preset from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "classic" => Some(Preset::Classic),
            "steep" => Some(Preset::Steep),
            "improved" | "improved_ddpm" => Some(Preset::Improved),
            "noise_level" | "noiselevel" => Some(Preset::NoiseLevel),
            _ => None,
        }
    }

    /// Returns the string name of this preset.
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Classic => "classic",
            Preset::Steep => "steep",
            Preset::Improved => "improved",
            Preset::NoiseLevel => "noise-level",
        }
    }

    /// Builds the schedule configuration for this preset.
    pub fn config(&self) -> ScheduleConfig {
        match self {
            Preset::Classic => ScheduleConfig::plain_cosine(10, 0.02, Denominator::TotalSteps),
            Preset::Steep => {
                ScheduleConfig::plain_cosine(50, 0.999, Denominator::TotalStepsMinusOne)
            }
            Preset::Improved => {
                ScheduleConfig::offset_cosine(50, DEFAULT_OFFSET, Denominator::TotalStepsMinusOne)
            }
            Preset::NoiseLevel => {
                ScheduleConfig::dual_scaled_cosine(50, DEFAULT_OFFSET).with_noise_bounds(0.0, 1.0)
            }
        }
    }
}
