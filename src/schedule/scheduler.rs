//! Noise scheduler: per-step beta, alpha, cumulative alpha and noise level.
//!
//! All values are evaluated on demand from the closed-form schedule. The
//! cumulative product is a full re-scan from step 0; [`ScheduleTable`]
//! produces the same values in one pass for callers that need every step.

use std::f64::consts::FRAC_PI_2;

use serde::Serialize;
use tracing::debug;

use crate::error::{DiffusionError, Result};

use super::family::{ScheduleConfig, ScheduleFamily};

/// Schedule values for one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScheduleSample {
    pub step: u32,
    pub beta: f64,
    pub alpha: f64,
    pub alpha_cumprod: f64,
    /// Presentational noise level (see [`NoiseScheduler::noise_level`]).
    pub noise_level: f64,
}

/// Stateless schedule engine over an immutable [`ScheduleConfig`].
#[derive(Debug, Clone)]
pub struct NoiseScheduler {
    config: ScheduleConfig,
}

impl NoiseScheduler {
    /// Creates a scheduler, failing fast on an invalid configuration.
    pub fn new(config: ScheduleConfig) -> Result<Self> {
        config.validate()?;

        debug!(
            family = config.family.as_str(),
            total_steps = config.total_steps,
            denominator = config.family.denominator(config.total_steps),
            "noise scheduler configured"
        );

        Ok(Self { config })
    }

    /// Returns the configuration this scheduler evaluates.
    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Returns the total number of steps `T`.
    pub fn total_steps(&self) -> u32 {
        self.config.total_steps
    }

    /// Returns the final (terminal) step index.
    pub fn last_step(&self) -> u32 {
        self.config.total_steps - 1
    }

    /// Returns true if `step` is the terminal step.
    pub fn is_terminal(&self, step: u32) -> bool {
        step == self.last_step()
    }

    /// Returns beta for `step`.
    pub fn beta(&self, step: u32) -> Result<f64> {
        self.check_step(step)?;
        finite("beta", self.raw_beta(step))
    }

    /// Returns `1 - beta(step)`.
    pub fn alpha(&self, step: u32) -> Result<f64> {
        Ok(1.0 - self.beta(step)?)
    }

    /// Returns the product of `alpha(s)` for `s` in `0..=step`.
    pub fn alpha_cumprod(&self, step: u32) -> Result<f64> {
        self.check_step(step)?;

        let mut product = 1.0;
        for s in 0..=step {
            product *= 1.0 - self.raw_beta(s);
        }

        finite("alpha_cumprod", product)
    }

    /// Returns the presentational noise level for `step`.
    ///
    /// With noise bounds configured this is `min + (max - min) * beta`;
    /// otherwise the variance-preserving `sqrt(1 - alpha_cumprod)`.
    pub fn noise_level(&self, step: u32) -> Result<f64> {
        let beta = self.beta(step)?;
        let alpha_cumprod = self.alpha_cumprod(step)?;
        finite("noise_level", self.level_from(beta, alpha_cumprod))
    }

    /// Returns every schedule value for `step`.
    pub fn sample(&self, step: u32) -> Result<ScheduleSample> {
        let beta = self.beta(step)?;
        let alpha_cumprod = self.alpha_cumprod(step)?;

        Ok(ScheduleSample {
            step,
            beta,
            alpha: 1.0 - beta,
            alpha_cumprod,
            noise_level: finite("noise_level", self.level_from(beta, alpha_cumprod))?,
        })
    }

    /// Builds the table of samples for every step in one pass.
    pub fn table(&self) -> Result<ScheduleTable> {
        let mut samples = Vec::with_capacity(self.config.total_steps as usize);
        let mut product = 1.0;

        for step in 0..self.config.total_steps {
            let beta = finite("beta", self.raw_beta(step))?;
            product *= 1.0 - beta;
            let alpha_cumprod = finite("alpha_cumprod", product)?;

            samples.push(ScheduleSample {
                step,
                beta,
                alpha: 1.0 - beta,
                alpha_cumprod,
                noise_level: finite("noise_level", self.level_from(beta, alpha_cumprod))?,
            });
        }

        Ok(ScheduleTable { samples })
    }

    fn check_step(&self, step: u32) -> Result<()> {
        if step >= self.config.total_steps {
            return Err(DiffusionError::step_out_of_range(
                step,
                self.config.total_steps,
            ));
        }
        Ok(())
    }

    fn level_from(&self, beta: f64, alpha_cumprod: f64) -> f64 {
        match self.config.noise_bounds {
            Some(bounds) => bounds.min_noise + (bounds.max_noise - bounds.min_noise) * beta,
            None => (1.0 - alpha_cumprod).max(0.0).sqrt(),
        }
    }

    /// Beta without range checks; `step` must already be validated.
    fn raw_beta(&self, step: u32) -> f64 {
        let denominator = self.config.family.denominator(self.config.total_steps) as f64;

        match self.config.family {
            ScheduleFamily::PlainCosine { max_beta, .. } => {
                let u = step as f64 / denominator;
                max_beta * (1.0 - (u * FRAC_PI_2).cos())
            }
            ScheduleFamily::OffsetCosineClipped {
                offset,
                clip_min,
                clip_max,
                ..
            } => {
                let current = closed_form_alpha_cumprod(step as f64, denominator, offset);
                let previous = if step == 0 {
                    1.0
                } else {
                    closed_form_alpha_cumprod((step - 1) as f64, denominator, offset)
                };
                (1.0 - current / previous).clamp(clip_min, clip_max)
            }
            ScheduleFamily::DualScaledCosine { offset } => {
                1.0 - closed_form_alpha_cumprod(step as f64, denominator, offset)
            }
        }
    }
}

/// `f(u) = cos(((u + s) / (1 + s)) * pi / 2)^2`.
fn offset_cosine(u: f64, offset: f64) -> f64 {
    (((u + offset) / (1.0 + offset)) * FRAC_PI_2).cos().powi(2)
}

/// `f(t / T') / f(0)`.
fn closed_form_alpha_cumprod(step: f64, denominator: f64, offset: f64) -> f64 {
    offset_cosine(step / denominator, offset) / offset_cosine(0.0, offset)
}

fn finite(what: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DiffusionError::non_finite(what, value))
    }
}

/// Precomputed schedule values for every step of a configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleTable {
    samples: Vec<ScheduleSample>,
}

impl ScheduleTable {
    /// Returns the sample for `step`, if in range.
    pub fn get(&self, step: u32) -> Option<&ScheduleSample> {
        self.samples.get(step as usize)
    }

    /// Returns all samples in step order.
    pub fn samples(&self) -> &[ScheduleSample] {
        &self.samples
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the table holds no steps.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Renders the table as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DiffusionError::serialization_failed("schedule table", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::schedule::family::{Denominator, Preset, DEFAULT_CLIP_MAX, DEFAULT_CLIP_MIN};

    fn all_presets() -> Vec<NoiseScheduler> {
        [
            Preset::Classic,
            Preset::Steep,
            Preset::Improved,
            Preset::NoiseLevel,
        ]
        .iter()
        .map(|p| NoiseScheduler::new(p.config()).unwrap())
        .collect()
    }

    #[test]
    fn betas_are_probabilities() {
        for scheduler in all_presets() {
            for step in 0..scheduler.total_steps() {
                let beta = scheduler.beta(step).unwrap();
                assert!(
                    (0.0..=1.0).contains(&beta),
                    "{} beta({}) = {}",
                    scheduler.config().family.as_str(),
                    step,
                    beta
                );
            }
        }
    }

    #[test]
    fn alpha_is_one_minus_beta() {
        for scheduler in all_presets() {
            for step in 0..scheduler.total_steps() {
                let beta = scheduler.beta(step).unwrap();
                assert_eq!(scheduler.alpha(step).unwrap(), 1.0 - beta);
            }
        }
    }

    #[test]
    fn alpha_cumprod_is_non_increasing() {
        for scheduler in all_presets() {
            let mut previous = scheduler.alpha_cumprod(0).unwrap();
            assert!(previous > 0.0 && previous <= 1.0);
            for step in 1..scheduler.total_steps() {
                let current = scheduler.alpha_cumprod(step).unwrap();
                assert!(current <= previous, "cumprod rose at step {}", step);
                assert!(current > 0.0);
                previous = current;
            }
        }
    }

    #[test]
    fn alpha_cumprod_starts_at_alpha_zero() {
        for scheduler in all_presets() {
            assert_eq!(
                scheduler.alpha_cumprod(0).unwrap(),
                scheduler.alpha(0).unwrap()
            );
        }
    }

    #[test]
    fn plain_cosine_endpoints() {
        let config = ScheduleConfig::plain_cosine(11, 0.02, Denominator::TotalStepsMinusOne);
        let scheduler = NoiseScheduler::new(config).unwrap();

        assert!(scheduler.beta(0).unwrap().abs() < 1e-9);
        assert!((scheduler.beta(10).unwrap() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn plain_cosine_classic_matches_formula() {
        let scheduler = NoiseScheduler::new(Preset::Classic.config()).unwrap();
        let expected = 0.02 * (1.0 - (0.5 * FRAC_PI_2).cos());
        assert!((scheduler.beta(5).unwrap() - expected).abs() < 1e-15);
    }

    #[test]
    fn offset_cosine_first_beta_in_clip_range() {
        let config = ScheduleConfig::offset_cosine(50, 0.008, Denominator::TotalStepsMinusOne);
        let scheduler = NoiseScheduler::new(config).unwrap();
        let beta = scheduler.beta(0).unwrap();
        assert!((DEFAULT_CLIP_MIN..=DEFAULT_CLIP_MAX).contains(&beta));
    }

    #[test]
    fn offset_cosine_uses_closed_form_ratio() {
        let config = ScheduleConfig::offset_cosine(50, 0.008, Denominator::TotalStepsMinusOne);
        let scheduler = NoiseScheduler::new(config).unwrap();

        let ratio = closed_form_alpha_cumprod(20.0, 49.0, 0.008)
            / closed_form_alpha_cumprod(19.0, 49.0, 0.008);
        assert_eq!(scheduler.beta(20).unwrap(), 1.0 - ratio);
    }

    #[test]
    fn offset_cosine_clipping_activates() {
        // Two steps over T' = 1: the raw betas are exactly 0 and almost 1.
        let config = ScheduleConfig::offset_cosine(2, 0.008, Denominator::TotalStepsMinusOne);
        let scheduler = NoiseScheduler::new(config).unwrap();

        assert_eq!(scheduler.beta(0).unwrap(), DEFAULT_CLIP_MIN);
        assert_eq!(scheduler.beta(1).unwrap(), DEFAULT_CLIP_MAX);
    }

    #[test]
    fn dual_scaled_is_unclipped_complement() {
        let config = ScheduleConfig::dual_scaled_cosine(10, 0.008);
        let scheduler = NoiseScheduler::new(config).unwrap();

        assert_eq!(scheduler.beta(0).unwrap(), 0.0);
        let expected = 1.0 - offset_cosine(0.3, 0.008) / offset_cosine(0.0, 0.008);
        assert_eq!(scheduler.beta(3).unwrap(), expected);
    }

    #[test]
    fn noise_level_modes() {
        let bounded = ScheduleConfig::dual_scaled_cosine(10, 0.008).with_noise_bounds(0.2, 0.6);
        let scheduler = NoiseScheduler::new(bounded).unwrap();
        assert!((scheduler.noise_level(0).unwrap() - 0.2).abs() < 1e-12);
        let beta = scheduler.beta(7).unwrap();
        assert!((scheduler.noise_level(7).unwrap() - (0.2 + 0.4 * beta)).abs() < 1e-12);

        let scheduler = NoiseScheduler::new(Preset::Classic.config()).unwrap();
        let cumprod = scheduler.alpha_cumprod(4).unwrap();
        assert_eq!(scheduler.noise_level(4).unwrap(), (1.0 - cumprod).sqrt());
    }

    #[test]
    fn out_of_range_step_is_rejected() {
        let scheduler = NoiseScheduler::new(Preset::Classic.config()).unwrap();
        assert_eq!(
            scheduler.beta(10).unwrap_err().code,
            ErrorCode::InvalidConfiguration
        );
        assert_eq!(
            scheduler.alpha_cumprod(11).unwrap_err().code,
            ErrorCode::InvalidConfiguration
        );
        assert!(scheduler.sample(9).is_ok());
    }

    #[test]
    fn table_json_lists_every_step() {
        let scheduler = NoiseScheduler::new(Preset::Classic.config()).unwrap();
        let json = scheduler.table().unwrap().to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let samples = value["samples"].as_array().unwrap();
        assert_eq!(samples.len(), 10);
        assert_eq!(samples[9]["step"], 9);
    }

    #[test]
    fn invalid_config_fails_fast() {
        let config = ScheduleConfig::plain_cosine(1, 0.02, Denominator::TotalSteps);
        let err = NoiseScheduler::new(config).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);

        // Never constructed, so no table is ever allocated for it.
        let config = ScheduleConfig::plain_cosine(u32::MAX, 0.02, Denominator::TotalSteps);
        let err = NoiseScheduler::new(config).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn table_matches_rescan_exactly() {
        for scheduler in all_presets() {
            let table = scheduler.table().unwrap();
            assert_eq!(table.len(), scheduler.total_steps() as usize);
            for step in 0..scheduler.total_steps() {
                assert_eq!(table.get(step), Some(&scheduler.sample(step).unwrap()));
            }
        }
    }

    #[test]
    fn terminal_step_detection() {
        let scheduler = NoiseScheduler::new(Preset::Classic.config()).unwrap();
        assert_eq!(scheduler.last_step(), 9);
        assert!(scheduler.is_terminal(9));
        assert!(!scheduler.is_terminal(8));
    }
}
