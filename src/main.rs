//! ddpm-forward: visualize the DDPM forward noising process.
//!
//! This binary can run in three modes:
//! - CLI mode: Render one step or every step of a source image to PNG
//! - Schedule mode: Print the schedule table as JSON
//! - Daemon mode: JSON-RPC server for editor or UI integration

use std::time::Instant;

use ddpm_forward::cli::{step_output_path, Cli};
use ddpm_forward::config::VisualizerConfig;
use ddpm_forward::error::{DiffusionError, Result};
use ddpm_forward::generation::{make_rng, render_all_steps, render_step};
use ddpm_forward::imaging::{load_letterboxed, write_png};
use ddpm_forward::rpc::{run_server, ServerState};
use ddpm_forward::sampler::{ForwardSampler, PixelGrid};
use ddpm_forward::schedule::NoiseScheduler;

fn main() {
    let cli = Cli::parse_args();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(cli.log_level())
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.apply_to(VisualizerConfig::from_env());
    config.validate()?;

    if cli.is_daemon_mode() {
        run_daemon_mode(config)
    } else if cli.is_schedule_mode() {
        run_schedule_mode(&config)
    } else if cli.is_render_mode() {
        run_render_mode(cli, &config)
    } else {
        print_usage();
        Ok(())
    }
}

/// Prints the schedule table as JSON to stdout.
fn run_schedule_mode(config: &VisualizerConfig) -> Result<()> {
    let scheduler = NoiseScheduler::new(config.schedule)?;
    let table = scheduler.table()?;

    println!("{}", table.to_json_pretty()?);

    Ok(())
}

/// Runs the CLI mode for frame rendering.
fn run_render_mode(cli: &Cli, config: &VisualizerConfig) -> Result<()> {
    let input = match cli.input.as_ref() {
        Some(input) => input,
        None => {
            print_usage();
            return Ok(());
        }
    };

    let scheduler = NoiseScheduler::new(config.schedule)?;
    let sampler = ForwardSampler::new(config.sampler);

    eprintln!("=== ddpm-forward ===");
    eprintln!("Input: {}", input.display());
    eprintln!(
        "Schedule: {} ({} steps)",
        config.schedule.family.as_str(),
        scheduler.total_steps()
    );
    eprintln!("Sampler: {}", config.sampler_summary());
    eprintln!("Canvas: {}x{}", config.image_size, config.image_size);
    if let Some(seed) = config.seed {
        eprintln!("Seed: {}", seed);
    }
    eprintln!();

    let source = load_letterboxed(input, config.image_size)?;

    if cli.all_steps {
        render_every_step(cli, config, &scheduler, &sampler, &source)
    } else {
        render_single_step(cli, config, &scheduler, &sampler, &source)
    }
}

fn render_single_step(
    cli: &Cli,
    config: &VisualizerConfig,
    scheduler: &NoiseScheduler,
    sampler: &ForwardSampler,
    source: &PixelGrid,
) -> Result<()> {
    let step = cli.step.unwrap_or(0);
    let output_path = cli.output_path();
    let mut rng = make_rng(config.seed);

    let frame = render_step(
        scheduler,
        sampler,
        source,
        step,
        config.terminal_pure_noise,
        &mut rng,
    )?;

    eprintln!("Step {}/{}", step, scheduler.last_step());
    eprintln!("  beta: {:.6}", frame.sample.beta);
    eprintln!("  alpha_cumprod: {:.6}", frame.sample.alpha_cumprod);
    eprintln!("  noise level: {:.6}", frame.sample.noise_level);
    eprintln!();

    write_png(&frame.grid, &output_path)?;
    eprintln!("Saved to: {}", output_path.display());

    Ok(())
}

fn render_every_step(
    cli: &Cli,
    config: &VisualizerConfig,
    scheduler: &NoiseScheduler,
    sampler: &ForwardSampler,
    source: &PixelGrid,
) -> Result<()> {
    let output_dir = cli.output_directory();
    std::fs::create_dir_all(&output_dir).map_err(|e| {
        DiffusionError::image_write_failed(format!("{}: {}", output_dir.display(), e))
    })?;

    let start_time = Instant::now();
    let mut rng = make_rng(config.seed);

    let frames = render_all_steps(
        scheduler,
        sampler,
        source,
        config.terminal_pure_noise,
        &mut rng,
        |done, total| {
            if done % 10 == 0 || done == total {
                eprintln!("Progress: {}/{} steps", done, total);
            }
        },
    )?;

    for frame in &frames {
        write_png(&frame.grid, &step_output_path(&output_dir, frame.sample.step))?;
    }

    eprintln!();
    eprintln!("Rendering complete!");
    eprintln!("  Time: {:.2}s", start_time.elapsed().as_secs_f32());
    eprintln!("  Frames: {}", frames.len());
    eprintln!("Saved to: {}", output_dir.display());

    Ok(())
}

/// Runs the daemon mode (JSON-RPC server).
fn run_daemon_mode(config: VisualizerConfig) -> Result<()> {
    eprintln!("=== ddpm-forward JSON-RPC Server ===");
    eprintln!("Reading from stdin, writing to stdout.");
    eprintln!("Send JSON-RPC requests to control the session.");
    eprintln!(
        "Schedule: {} ({} steps)",
        config.schedule.family.as_str(),
        config.schedule.total_steps
    );
    eprintln!();

    let state = ServerState::new(config)?;
    run_server(state)
}

/// Prints usage information.
fn print_usage() {
    eprintln!("ddpm-forward: visualize the DDPM forward noising process");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  Single step:");
    eprintln!("    ddpm-forward --input cat.png --step 5 --output noised.png");
    eprintln!();
    eprintln!("  Every step:");
    eprintln!("    ddpm-forward --input cat.png --all-steps --output-dir frames --preset improved");
    eprintln!();
    eprintln!("  Schedule table (JSON):");
    eprintln!("    ddpm-forward --schedule --preset steep");
    eprintln!();
    eprintln!("  Daemon mode (JSON-RPC server):");
    eprintln!("    ddpm-forward --daemon");
    eprintln!();
    eprintln!("Run 'ddpm-forward --help' for full options.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_usage_doesnt_panic() {
        print_usage();
    }
}
