//! Visualizer configuration module.
//!
//! Contains the runtime configuration for a visualization session: the
//! noise schedule, the sampler conventions, the canvas size and the seed.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DiffusionError, Result};
use crate::imaging::DEFAULT_IMAGE_SIZE;
use crate::sampler::{AlphaPolicy, BlendDomain, NoiseAmplitude, SamplerOptions};
use crate::schedule::{Denominator, Preset, ScheduleConfig, ScheduleFamily, MAX_TOTAL_STEPS};

/// Largest canvas edge accepted.
pub const MAX_IMAGE_SIZE: u32 = 4096;

fn default_image_size() -> u32 {
    DEFAULT_IMAGE_SIZE
}

fn default_terminal_pure_noise() -> bool {
    true
}

/// Runtime configuration for the visualizer.
///
/// This configuration is typically loaded from command-line arguments
/// or environment variables at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizerConfig {
    /// Noise schedule.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Blend convention and opacity handling.
    #[serde(default)]
    pub sampler: SamplerOptions,

    /// Edge length of the square letterbox canvas.
    #[serde(default = "default_image_size")]
    pub image_size: u32,

    /// Seed for the random source. If None, seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Replace the last step with uniform random noise.
    #[serde(default = "default_terminal_pure_noise")]
    pub terminal_pure_noise: bool,
}

impl VisualizerConfig {
    /// Creates a new VisualizerConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a VisualizerConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `DDPM_PRESET` - Schedule preset (classic, steep, improved, noise-level)
    /// - `DDPM_TOTAL_STEPS` - Number of diffusion steps
    /// - `DDPM_MAX_BETA` - Plain cosine maximum beta
    /// - `DDPM_OFFSET` - Cosine offset `s`
    /// - `DDPM_BLEND` - Blend domain (byte, normalized)
    /// - `DDPM_ALPHA_POLICY` - Opacity handling (copy, opaque)
    /// - `DDPM_IMAGE_SIZE` - Canvas edge length
    /// - `DDPM_SEED` - Random seed
    ///
    /// Falls back to defaults for unset or unparseable variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(preset) = lookup("DDPM_PRESET").and_then(|s| Preset::parse(&s)) {
            config.schedule = preset.config();
        }

        if let Some(steps) = lookup("DDPM_TOTAL_STEPS").and_then(|s| s.parse::<u32>().ok()) {
            if steps > 1 && steps <= MAX_TOTAL_STEPS {
                config.schedule.total_steps = steps;
            }
        }

        if let Some(value) = lookup("DDPM_MAX_BETA").and_then(|s| s.parse::<f64>().ok()) {
            match &mut config.schedule.family {
                ScheduleFamily::PlainCosine { max_beta, .. } => *max_beta = value,
                family => warn_unused_parameter(family, "DDPM_MAX_BETA"),
            }
        }

        if let Some(value) = lookup("DDPM_OFFSET").and_then(|s| s.parse::<f64>().ok()) {
            match &mut config.schedule.family {
                ScheduleFamily::OffsetCosineClipped { offset, .. }
                | ScheduleFamily::DualScaledCosine { offset } => *offset = value,
                family => warn_unused_parameter(family, "DDPM_OFFSET"),
            }
        }

        if let Some(blend) = lookup("DDPM_BLEND").and_then(|s| BlendDomain::parse(&s)) {
            config.sampler.blend = blend;
        }

        if let Some(policy) = lookup("DDPM_ALPHA_POLICY").and_then(|s| AlphaPolicy::parse(&s)) {
            config.sampler.alpha_policy = policy;
        }

        if let Some(size) = lookup("DDPM_IMAGE_SIZE").and_then(|s| s.parse::<u32>().ok()) {
            if size > 0 && size <= MAX_IMAGE_SIZE {
                config.image_size = size;
            }
        }

        if let Some(seed) = lookup("DDPM_SEED").and_then(|s| s.parse::<u64>().ok()) {
            config.seed = Some(seed);
        }

        config
    }

    /// Returns a copy using the named preset's schedule.
    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.schedule = preset.config();
        self
    }

    /// Returns a short human-readable summary of the sampler options.
    pub fn sampler_summary(&self) -> String {
        let policy = match self.sampler.alpha_policy {
            AlphaPolicy::CopyThrough => "copy alpha",
            AlphaPolicy::ForceOpaque => "opaque",
        };
        match self.sampler.blend {
            BlendDomain::Byte {
                amplitude: NoiseAmplitude::FullScale,
            } => format!("byte blend, full-scale noise, {}", policy),
            BlendDomain::Byte {
                amplitude: NoiseAmplitude::MidGrayBiased,
            } => format!("byte blend, mid-gray noise, {}", policy),
            BlendDomain::Normalized => format!("normalized blend, {}", policy),
        }
    }

    /// Returns the denominator mode in use, if the family has one.
    pub fn denominator(&self) -> Option<Denominator> {
        match self.schedule.family {
            ScheduleFamily::PlainCosine { denominator, .. }
            | ScheduleFamily::OffsetCosineClipped { denominator, .. } => Some(denominator),
            ScheduleFamily::DualScaledCosine { .. } => None,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        self.schedule.validate()?;

        if self.image_size == 0 {
            return Err(DiffusionError::invalid_configuration("image_size must be > 0"));
        }
        if self.image_size > MAX_IMAGE_SIZE {
            return Err(DiffusionError::invalid_configuration(format!(
                "image_size too high: {} (max {})",
                self.image_size, MAX_IMAGE_SIZE
            )));
        }

        Ok(())
    }
}

/// Logs a parameter that the selected schedule family has no use for.
pub(crate) fn warn_unused_parameter(family: &ScheduleFamily, parameter: &str) {
    warn!(
        family = family.as_str(),
        parameter, "parameter does not apply to this schedule family; ignored"
    );
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            sampler: SamplerOptions::default(),
            image_size: DEFAULT_IMAGE_SIZE,
            seed: None,
            terminal_pure_noise: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_defaults() {
        let config = VisualizerConfig::new();
        assert_eq!(config.schedule, Preset::Classic.config());
        assert_eq!(config.image_size, 256);
        assert!(config.seed.is_none());
        assert!(config.terminal_pure_noise);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_validation() {
        let mut config = VisualizerConfig::new();

        config.image_size = 0;
        assert_eq!(config.validate().unwrap_err().code, ErrorCode::InvalidConfiguration);

        config.image_size = MAX_IMAGE_SIZE + 1;
        assert!(config.validate().is_err());

        config.image_size = 64;
        config.schedule.total_steps = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_lookup_empty_gives_defaults() {
        let config = VisualizerConfig::from_lookup(|_| None);
        assert_eq!(config, VisualizerConfig::default());
    }

    #[test]
    fn from_lookup_reads_all_keys() {
        let config = VisualizerConfig::from_lookup(lookup(&[
            ("DDPM_PRESET", "improved"),
            ("DDPM_TOTAL_STEPS", "20"),
            ("DDPM_OFFSET", "0.01"),
            ("DDPM_BLEND", "normalized"),
            ("DDPM_ALPHA_POLICY", "opaque"),
            ("DDPM_IMAGE_SIZE", "128"),
            ("DDPM_SEED", "77"),
        ]));

        assert_eq!(config.schedule.total_steps, 20);
        match config.schedule.family {
            ScheduleFamily::OffsetCosineClipped { offset, .. } => assert_eq!(offset, 0.01),
            other => panic!("unexpected family {:?}", other),
        }
        assert_eq!(config.sampler.blend, BlendDomain::Normalized);
        assert_eq!(config.sampler.alpha_policy, AlphaPolicy::ForceOpaque);
        assert_eq!(config.image_size, 128);
        assert_eq!(config.seed, Some(77));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn from_lookup_ignores_step_count_above_cap() {
        let config = VisualizerConfig::from_lookup(lookup(&[("DDPM_TOTAL_STEPS", "5000")]));
        assert_eq!(config.schedule.total_steps, 10);

        let config = VisualizerConfig::from_lookup(lookup(&[("DDPM_TOTAL_STEPS", "1000")]));
        assert_eq!(config.schedule.total_steps, MAX_TOTAL_STEPS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn offset_does_not_touch_plain_cosine() {
        let config = VisualizerConfig::from_lookup(lookup(&[("DDPM_OFFSET", "0.2")]));
        assert_eq!(config.schedule, Preset::Classic.config());
    }

    #[test]
    fn from_lookup_ignores_bad_values() {
        let config = VisualizerConfig::from_lookup(lookup(&[
            ("DDPM_PRESET", "bogus"),
            ("DDPM_TOTAL_STEPS", "1"),
            ("DDPM_IMAGE_SIZE", "0"),
            ("DDPM_SEED", "abc"),
        ]));
        assert_eq!(config, VisualizerConfig::default());
    }

    #[test]
    fn max_beta_applies_to_plain_cosine_only() {
        let config = VisualizerConfig::from_lookup(lookup(&[("DDPM_MAX_BETA", "0.5")]));
        match config.schedule.family {
            ScheduleFamily::PlainCosine { max_beta, .. } => assert_eq!(max_beta, 0.5),
            other => panic!("unexpected family {:?}", other),
        }

        let config = VisualizerConfig::from_lookup(lookup(&[
            ("DDPM_PRESET", "improved"),
            ("DDPM_MAX_BETA", "0.5"),
        ]));
        assert_eq!(config.schedule, Preset::Improved.config());
    }

    #[test]
    fn serde_fills_defaults() {
        let config: VisualizerConfig = serde_json::from_str(r#"{"seed": 3}"#).unwrap();
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.image_size, 256);
        assert!(config.terminal_pure_noise);
        assert_eq!(config.schedule, Preset::Classic.config());
    }

    #[test]
    fn sampler_summary_names_blend() {
        let mut config = VisualizerConfig::new();
        assert!(config.sampler_summary().starts_with("byte blend, full-scale"));
        config.sampler.blend = BlendDomain::Normalized;
        config.sampler.alpha_policy = AlphaPolicy::ForceOpaque;
        assert_eq!(config.sampler_summary(), "normalized blend, opaque");
    }

    #[test]
    fn denominator_is_none_for_dual_scaled() {
        let config = VisualizerConfig::new().with_preset(Preset::NoiseLevel);
        assert!(config.denominator().is_none());
        let config = VisualizerConfig::new().with_preset(Preset::Steep);
        assert_eq!(config.denominator(), Some(Denominator::TotalStepsMinusOne));
    }
}
