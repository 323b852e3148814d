//! CLI argument parser for standalone mode.
//!
//! Provides command-line interface for rendering noised frames and
//! inspecting schedules without the JSON-RPC server.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum};

use crate::config::{warn_unused_parameter, VisualizerConfig};
use crate::sampler::{AlphaPolicy, BlendDomain, NoiseAmplitude};
use crate::schedule::{Denominator, Preset, ScheduleFamily};

/// Available schedule presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PresetArg {
    /// Classic: 10 steps of plain cosine, max beta 0.02
    #[default]
    Classic,
    /// Steep: 50 steps of plain cosine, max beta 0.999
    Steep,
    /// Improved: 50 steps of clipped offset cosine (s = 0.008)
    Improved,
    /// Noise level: 50 steps of dual-scaled cosine in [0, 1]
    NoiseLevel,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Classic => Preset::Classic,
            PresetArg::Steep => Preset::Steep,
            PresetArg::Improved => Preset::Improved,
            PresetArg::NoiseLevel => Preset::NoiseLevel,
        }
    }
}

/// Step denominator modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DenominatorArg {
    /// u = t / T
    Total,
    /// u = t / (T - 1), so the last step reaches u = 1
    MinusOne,
}

impl From<DenominatorArg> for Denominator {
    fn from(arg: DenominatorArg) -> Self {
        match arg {
            DenominatorArg::Total => Denominator::TotalSteps,
            DenominatorArg::MinusOne => Denominator::TotalStepsMinusOne,
        }
    }
}

/// Blend domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BlendArg {
    /// Blend byte values with scaled noise
    Byte,
    /// Blend in [-1, 1] with unit noise
    Normalized,
}

/// Byte-domain noise amplitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AmplitudeArg {
    /// 255 * eps
    Full,
    /// 128 + 128 * eps
    MidGray,
}

impl From<AmplitudeArg> for NoiseAmplitude {
    fn from(arg: AmplitudeArg) -> Self {
        match arg {
            AmplitudeArg::Full => NoiseAmplitude::FullScale,
            AmplitudeArg::MidGray => NoiseAmplitude::MidGrayBiased,
        }
    }
}

/// Opacity handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlphaPolicyArg {
    /// Keep the source opacity
    Copy,
    /// Force every pixel opaque
    Opaque,
}

impl From<AlphaPolicyArg> for AlphaPolicy {
    fn from(arg: AlphaPolicyArg) -> Self {
        match arg {
            AlphaPolicyArg::Copy => AlphaPolicy::CopyThrough,
            AlphaPolicyArg::Opaque => AlphaPolicy::ForceOpaque,
        }
    }
}

/// ddpm-forward: visualize the DDPM forward noising process
#[derive(Parser, Debug)]
#[command(name = "ddpm-forward")]
#[command(about = "Renders images at any step of the DDPM forward noising process")]
#[command(version)]
pub struct Cli {
    /// Source image to noise
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output PNG file path (single step)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output directory (all steps)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Diffusion step to render (0-based)
    #[arg(short = 't', long)]
    pub step: Option<u32>,

    /// Render every step of the schedule
    #[arg(long, conflicts_with = "step")]
    pub all_steps: bool,

    /// Print the schedule table as JSON and exit
    #[arg(long)]
    pub schedule: bool,

    /// Run in daemon mode (JSON-RPC over stdio)
    #[arg(long)]
    pub daemon: bool,

    /// Schedule preset
    #[arg(short, long, value_enum)]
    pub preset: Option<PresetArg>,

    /// Number of diffusion steps (overrides the preset)
    #[arg(long)]
    pub steps: Option<u32>,

    /// Maximum beta (plain cosine only)
    #[arg(long)]
    pub max_beta: Option<f64>,

    /// Cosine offset s (offset and dual-scaled cosine only)
    #[arg(long)]
    pub offset: Option<f64>,

    /// Step denominator (plain and offset cosine only)
    #[arg(long, value_enum)]
    pub denominator: Option<DenominatorArg>,

    /// Blend domain
    #[arg(long, value_enum)]
    pub blend: Option<BlendArg>,

    /// Noise amplitude for the byte blend
    #[arg(long, value_enum)]
    pub amplitude: Option<AmplitudeArg>,

    /// Opacity handling outside the terminal step
    #[arg(long, value_enum)]
    pub alpha_policy: Option<AlphaPolicyArg>,

    /// Blend the last step too instead of replacing it with pure noise
    #[arg(long)]
    pub no_terminal_noise: bool,

    /// Letterbox canvas edge length in pixels
    #[arg(long)]
    pub size: Option<u32>,

    /// Random seed for reproducible noise
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Returns true if running in daemon mode.
    pub fn is_daemon_mode(&self) -> bool {
        self.daemon
    }

    /// Returns true if only the schedule table is requested.
    pub fn is_schedule_mode(&self) -> bool {
        !self.daemon && self.schedule
    }

    /// Returns true if rendering frames from an input image.
    pub fn is_render_mode(&self) -> bool {
        !self.daemon && !self.schedule && self.input.is_some()
    }

    /// Returns the effective output path for a single step.
    ///
    /// Defaults to "noised.png" in the current directory if not specified.
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| PathBuf::from("noised.png"))
    }

    /// Returns the effective output directory for all steps.
    pub fn output_directory(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("frames"))
    }

    /// Returns the tracing filter level for the verbosity count.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }

    /// Returns the schedule flags that were given but have no meaning for `family`.
    pub fn ignored_schedule_flags(&self, family: &ScheduleFamily) -> Vec<&'static str> {
        let mut ignored = Vec::new();
        if self.max_beta.is_some() && !family.uses_max_beta() {
            ignored.push("--max-beta");
        }
        if self.offset.is_some() && !family.uses_offset() {
            ignored.push("--offset");
        }
        if self.denominator.is_some() && !family.uses_denominator() {
            ignored.push("--denominator");
        }
        ignored
    }

    /// Applies the command-line overrides on top of `base`.
    ///
    /// Schedule flags that do not apply to the selected family are logged
    /// and ignored.
    pub fn apply_to(&self, base: VisualizerConfig) -> VisualizerConfig {
        let mut config = base;

        if let Some(preset) = self.preset {
            config = config.with_preset(preset.into());
        }

        if let Some(steps) = self.steps {
            config.schedule.total_steps = steps;
        }

        for flag in self.ignored_schedule_flags(&config.schedule.family) {
            warn_unused_parameter(&config.schedule.family, flag);
        }

        match &mut config.schedule.family {
            ScheduleFamily::PlainCosine {
                max_beta,
                denominator,
            } => {
                if let Some(value) = self.max_beta {
                    *max_beta = value;
                }
                if let Some(value) = self.denominator {
                    *denominator = value.into();
                }
            }
            ScheduleFamily::OffsetCosineClipped {
                offset,
                denominator,
                ..
            } => {
                if let Some(value) = self.offset {
                    *offset = value;
                }
                if let Some(value) = self.denominator {
                    *denominator = value.into();
                }
            }
            ScheduleFamily::DualScaledCosine { offset } => {
                if let Some(value) = self.offset {
                    *offset = value;
                }
            }
        }

        match (self.blend, self.amplitude) {
            (Some(BlendArg::Normalized), _) => config.sampler.blend = BlendDomain::Normalized,
            (Some(BlendArg::Byte), amplitude) => {
                config.sampler.blend = BlendDomain::Byte {
                    amplitude: amplitude.map(Into::into).unwrap_or_default(),
                }
            }
            (None, Some(amplitude)) => {
                if let BlendDomain::Byte { .. } = config.sampler.blend {
                    config.sampler.blend = BlendDomain::Byte {
                        amplitude: amplitude.into(),
                    };
                }
            }
            (None, None) => {}
        }

        if let Some(policy) = self.alpha_policy {
            config.sampler.alpha_policy = policy.into();
        }

        if self.no_terminal_noise {
            config.terminal_pure_noise = false;
        }

        if let Some(size) = self.size {
            config.image_size = size;
        }

        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config
    }
}

/// Returns the file name used for a step in all-steps mode.
pub fn step_file_name(step: u32) -> String {
    format!("step_{:03}.png", step)
}

/// Returns the output path for a step inside `dir`.
pub fn step_output_path(dir: &Path, step: u32) -> PathBuf {
    dir.join(step_file_name(step))
}
