//! Forward diffusion sampler.
//!
//! Draws `x_t = sqrt(alpha_cumprod) * x_0 + sqrt(1 - alpha_cumprod) * eps`
//! independently for every color channel of every pixel.

use ndarray::ArrayViewMut3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DiffusionError, Result};

use super::grid::{PixelGrid, COLOR_CHANNELS};
use super::noise::{box_muller, clamp_to_byte, from_normalized, to_normalized, uniform_byte};

/// Noise amplitude used by the byte-domain blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoiseAmplitude {
    /// `255 * eps`.
    #[default]
    FullScale,
    /// `128 + 128 * eps`.
    MidGrayBiased,
}

impl NoiseAmplitude {
    /// Parses an amplitude from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "full" | "full_scale" => Some(NoiseAmplitude::FullScale),
            "mid_gray" | "mid_grey" | "mid_gray_biased" => Some(NoiseAmplitude::MidGrayBiased),
            _ => None,
        }
    }

    fn of(&self, eps: f64) -> f64 {
        match self {
            NoiseAmplitude::FullScale => 255.0 * eps,
            NoiseAmplitude::MidGrayBiased => 128.0 + 128.0 * eps,
        }
    }
}

/// Value domain in which signal and noise are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum BlendDomain {
    /// Blend raw byte values with a scaled noise amplitude.
    Byte {
        #[serde(default)]
        amplitude: NoiseAmplitude,
    },
    /// Rescale to `[-1, 1]`, blend with unit noise, rescale back.
    Normalized,
}

impl Default for BlendDomain {
    fn default() -> Self {
        BlendDomain::Byte {
            amplitude: NoiseAmplitude::default(),
        }
    }
}

impl BlendDomain {
    /// Parses a blend domain from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "byte" => Some(BlendDomain::default()),
            "normalized" | "normalised" => Some(BlendDomain::Normalized),
            _ => None,
        }
    }

    /// Returns the string name of this domain.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlendDomain::Byte { .. } => "byte",
            BlendDomain::Normalized => "normalized",
        }
    }
}

/// Treatment of the opacity channel outside the terminal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlphaPolicy {
    /// Copy the source opacity unchanged.
    #[default]
    CopyThrough,
    /// Write 255 everywhere.
    ForceOpaque,
}

impl AlphaPolicy {
    /// Parses an alpha policy from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "copy" | "copy_through" => Some(AlphaPolicy::CopyThrough),
            "opaque" | "force_opaque" => Some(AlphaPolicy::ForceOpaque),
            _ => None,
        }
    }
}

/// Options selecting the blend convention and opacity handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SamplerOptions {
    #[serde(default)]
    pub blend: BlendDomain,
    #[serde(default)]
    pub alpha_policy: AlphaPolicy,
}

/// Samples noised grids from the forward process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardSampler {
    options: SamplerOptions,
}

impl ForwardSampler {
    /// Creates a sampler with the given options.
    pub fn new(options: SamplerOptions) -> Self {
        Self { options }
    }

    /// Returns the sampler options.
    pub fn options(&self) -> &SamplerOptions {
        &self.options
    }

    /// Returns a freshly allocated noised copy of `source`.
    ///
    /// `cum_alpha` is the cumulative alpha product for the step. When
    /// `terminal` is set the blend is skipped and every color channel is a
    /// uniform random byte with opacity forced to 255.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` if `source` does not hold `width * height` pixels
    /// - `NonFiniteValue` if `cum_alpha` is NaN or infinite
    /// - `InvalidConfiguration` if `cum_alpha` lies outside `[0, 1]`
    pub fn sample<R: Rng + ?Sized>(
        &self,
        source: &PixelGrid,
        cum_alpha: f64,
        terminal: bool,
        rng: &mut R,
    ) -> Result<PixelGrid> {
        let src = source.view()?;

        if !cum_alpha.is_finite() {
            return Err(DiffusionError::non_finite("cumulative alpha", cum_alpha));
        }
        if !(0.0..=1.0).contains(&cum_alpha) {
            return Err(DiffusionError::invalid_configuration(format!(
                "cumulative alpha must be in [0, 1], got {}",
                cum_alpha
            )));
        }

        debug!(
            width = source.width,
            height = source.height,
            cum_alpha,
            terminal,
            blend = self.options.blend.as_str(),
            "sampling forward diffusion"
        );

        let mut data = vec![0u8; source.data.len()];
        {
            let mut out = ArrayViewMut3::from_shape(src.raw_dim(), &mut data).map_err(|_| {
                DiffusionError::dimension_mismatch(source.width, source.height, source.data.len())
            })?;

            if terminal {
                for mut dst in out.rows_mut() {
                    for c in 0..COLOR_CHANNELS {
                        dst[c] = uniform_byte(rng);
                    }
                    dst[COLOR_CHANNELS] = 255;
                }
            } else {
                let signal = cum_alpha.sqrt();
                let noise_scale = (1.0 - cum_alpha).sqrt();

                // Lanes iterate in row-major order, one RGBA pixel each.
                for (mut dst, px) in out.rows_mut().into_iter().zip(src.rows()) {
                    for c in 0..COLOR_CHANNELS {
                        let eps = box_muller(rng);
                        dst[c] = self.blend(px[c], eps, signal, noise_scale);
                    }
                    dst[COLOR_CHANNELS] = match self.options.alpha_policy {
                        AlphaPolicy::CopyThrough => px[COLOR_CHANNELS],
                        AlphaPolicy::ForceOpaque => 255,
                    };
                }
            }
        }

        Ok(PixelGrid {
            width: source.width,
            height: source.height,
            data,
        })
    }

    fn blend(&self, pixel: u8, eps: f64, signal: f64, noise_scale: f64) -> u8 {
        let value = match self.options.blend {
            BlendDomain::Byte { amplitude } => {
                pixel as f64 * signal + amplitude.of(eps) * noise_scale
            }
            BlendDomain::Normalized => {
                from_normalized(to_normalized(pixel as f64) * signal + eps * noise_scale)
            }
        };
        clamp_to_byte(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use rand::rngs::mock::StepRng;
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    /// Test image with a gradient and varying opacity.
    fn gradient(width: u32, height: u32) -> PixelGrid {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push((x * 255 / width.max(1)) as u8);
                data.push((y * 255 / height.max(1)) as u8);
                data.push(((x + y) % 256) as u8);
                data.push(((x * 7 + y * 3) % 256) as u8);
            }
        }
        PixelGrid::from_raw(width, height, data).unwrap()
    }

    fn all_options() -> Vec<SamplerOptions> {
        let mut options = Vec::new();
        for blend in [
            BlendDomain::Byte {
                amplitude: NoiseAmplitude::FullScale,
            },
            BlendDomain::Byte {
                amplitude: NoiseAmplitude::MidGrayBiased,
            },
            BlendDomain::Normalized,
        ] {
            for alpha_policy in [AlphaPolicy::CopyThrough, AlphaPolicy::ForceOpaque] {
                options.push(SamplerOptions {
                    blend,
                    alpha_policy,
                });
            }
        }
        options
    }

    /// Counts calls into the wrapped generator.
    struct CountingRng {
        inner: ChaCha8Rng,
        calls: usize,
    }

    impl RngCore for CountingRng {
        fn next_u32(&mut self) -> u32 {
            self.calls += 1;
            self.inner.next_u32()
        }

        fn next_u64(&mut self) -> u64 {
            self.calls += 1;
            self.inner.next_u64()
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            self.calls += 1;
            self.inner.fill_bytes(dest)
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            self.calls += 1;
            self.inner.try_fill_bytes(dest)
        }
    }

    #[test]
    fn full_signal_reproduces_source() {
        let source = gradient(16, 12);
        for options in all_options() {
            let sampler = ForwardSampler::new(options);
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            let out = sampler.sample(&source, 1.0, false, &mut rng).unwrap();

            for (i, (a, b)) in source.data.iter().zip(out.data.iter()).enumerate() {
                if i % 4 == 3 {
                    continue;
                }
                assert!(
                    (*a as i16 - *b as i16).abs() <= 1,
                    "{:?}: byte {} changed from {} to {}",
                    options,
                    i,
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn output_dimensions_match_source() {
        let source = gradient(7, 3);
        for options in all_options() {
            let sampler = ForwardSampler::new(options);
            let mut rng = ChaCha8Rng::seed_from_u64(2);
            for (cum_alpha, terminal) in [(1.0, false), (0.5, false), (0.0, false), (0.3, true)] {
                let out = sampler.sample(&source, cum_alpha, terminal, &mut rng).unwrap();
                assert!(out.same_dimensions(&source));
                assert_eq!(out.data.len(), source.data.len());
            }
        }
    }

    #[test]
    fn alpha_policy_is_honored() {
        let source = gradient(8, 8);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let copy = ForwardSampler::new(SamplerOptions {
            alpha_policy: AlphaPolicy::CopyThrough,
            ..Default::default()
        })
        .sample(&source, 0.4, false, &mut rng)
        .unwrap();
        let opaque = ForwardSampler::new(SamplerOptions {
            alpha_policy: AlphaPolicy::ForceOpaque,
            ..Default::default()
        })
        .sample(&source, 0.4, false, &mut rng)
        .unwrap();

        for i in (3..source.data.len()).step_by(4) {
            assert_eq!(copy.data[i], source.data[i]);
            assert_eq!(opaque.data[i], 255);
        }
    }

    #[test]
    fn terminal_step_is_uniform_and_opaque() {
        let source = PixelGrid::filled(128, 128, [10, 20, 30, 0]);
        let sampler = ForwardSampler::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let out = sampler.sample(&source, 0.5, true, &mut rng).unwrap();

        let mut counts = [0usize; 256];
        for px in out.data.chunks_exact(4) {
            counts[px[0] as usize] += 1;
            counts[px[1] as usize] += 1;
            counts[px[2] as usize] += 1;
            assert_eq!(px[3], 255);
        }

        let total: usize = counts.iter().sum();
        let expected = total as f64 / 256.0;
        let chi_square: f64 = counts
            .iter()
            .map(|&c| (c as f64 - expected).powi(2) / expected)
            .sum();

        // 255 degrees of freedom; 350 is far beyond the 0.1% critical value.
        assert!(chi_square < 350.0, "chi-square too large: {}", chi_square);
    }

    #[test]
    fn fresh_pair_per_color_channel() {
        let source = gradient(2, 2);
        let sampler = ForwardSampler::default();

        let mut rng = CountingRng {
            inner: ChaCha8Rng::seed_from_u64(4),
            calls: 0,
        };
        sampler.sample(&source, 0.5, false, &mut rng).unwrap();
        assert_eq!(rng.calls, 4 * COLOR_CHANNELS * 2);

        let mut rng = CountingRng {
            inner: ChaCha8Rng::seed_from_u64(4),
            calls: 0,
        };
        sampler.sample(&source, 0.5, true, &mut rng).unwrap();
        assert_eq!(rng.calls, 4 * COLOR_CHANNELS);
    }

    #[test]
    fn fixed_sequence_is_deterministic() {
        let source = gradient(9, 5);
        for options in all_options() {
            let sampler = ForwardSampler::new(options);
            let mut first = StepRng::new(0x0123_4567_89ab_cdef, 0x9e37_79b9_7f4a_7c15);
            let mut second = StepRng::new(0x0123_4567_89ab_cdef, 0x9e37_79b9_7f4a_7c15);

            let a = sampler.sample(&source, 0.37, false, &mut first).unwrap();
            let b = sampler.sample(&source, 0.37, false, &mut second).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn normalized_blend_matches_formula() {
        let source = gradient(4, 4);
        let sampler = ForwardSampler::new(SamplerOptions {
            blend: BlendDomain::Normalized,
            alpha_policy: AlphaPolicy::CopyThrough,
        });

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let out = sampler.sample(&source, 0.25, false, &mut rng).unwrap();

        let mut replay = ChaCha8Rng::seed_from_u64(11);
        for (src, dst) in source.data.chunks_exact(4).zip(out.data.chunks_exact(4)) {
            for c in 0..COLOR_CHANNELS {
                let eps = box_muller(&mut replay);
                let x_t = to_normalized(src[c] as f64) * 0.5 + eps * 0.75f64.sqrt();
                assert_eq!(dst[c], clamp_to_byte(from_normalized(x_t)));
            }
        }
    }

    #[test]
    fn mid_gray_noise_at_zero_signal() {
        // With no signal left, the blend is just 128 + 128 * eps.
        let source = gradient(4, 4);
        let sampler = ForwardSampler::new(SamplerOptions {
            blend: BlendDomain::Byte {
                amplitude: NoiseAmplitude::MidGrayBiased,
            },
            alpha_policy: AlphaPolicy::ForceOpaque,
        });

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let out = sampler.sample(&source, 0.0, false, &mut rng).unwrap();

        let mut replay = ChaCha8Rng::seed_from_u64(5);
        for px in out.data.chunks_exact(4) {
            for c in 0..COLOR_CHANNELS {
                let eps = box_muller(&mut replay);
                assert_eq!(px[c], clamp_to_byte(128.0 + 128.0 * eps));
            }
        }
    }

    #[test]
    fn source_is_not_mutated() {
        let source = gradient(6, 6);
        let before = source.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        ForwardSampler::default()
            .sample(&source, 0.1, false, &mut rng)
            .unwrap();
        assert_eq!(source, before);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let source = PixelGrid {
            width: 4,
            height: 4,
            data: vec![0; 10],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = ForwardSampler::default()
            .sample(&source, 0.5, false, &mut rng)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DimensionMismatch);
    }

    #[test]
    fn overflowing_dimensions_are_rejected() {
        let source = PixelGrid {
            width: 1 << 31,
            height: 1 << 31,
            data: vec![],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for terminal in [false, true] {
            let err = ForwardSampler::default()
                .sample(&source, 0.5, terminal, &mut rng)
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::DimensionMismatch);
        }
    }

    #[test]
    fn bad_cum_alpha_is_rejected() {
        let source = gradient(2, 2);
        let sampler = ForwardSampler::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let err = sampler.sample(&source, f64::NAN, false, &mut rng).unwrap_err();
        assert_eq!(err.code, ErrorCode::NonFiniteValue);

        let err = sampler.sample(&source, 1.5, false, &mut rng).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);

        let err = sampler.sample(&source, -0.1, true, &mut rng).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn option_parsing() {
        assert_eq!(BlendDomain::parse("normalized"), Some(BlendDomain::Normalized));
        assert_eq!(BlendDomain::parse("byte"), Some(BlendDomain::default()));
        assert_eq!(BlendDomain::parse("float"), None);
        assert_eq!(AlphaPolicy::parse("force-opaque"), Some(AlphaPolicy::ForceOpaque));
        assert_eq!(AlphaPolicy::parse("copy"), Some(AlphaPolicy::CopyThrough));
        assert_eq!(NoiseAmplitude::parse("mid-gray"), Some(NoiseAmplitude::MidGrayBiased));
    }

    #[test]
    fn options_serde() {
        let options = SamplerOptions {
            blend: BlendDomain::Byte {
                amplitude: NoiseAmplitude::MidGrayBiased,
            },
            alpha_policy: AlphaPolicy::ForceOpaque,
        };
        let json = serde_json::to_string(&options).unwrap();
        let back: SamplerOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);

        let parsed: SamplerOptions = serde_json::from_str(r#"{"blend":{"domain":"normalized"}}"#).unwrap();
        assert_eq!(parsed.blend, BlendDomain::Normalized);
        assert_eq!(parsed.alpha_policy, AlphaPolicy::CopyThrough);
    }
}
