//! # STRATA Frame Runner
//!
//! Command-line driver: runs the allocator frame loop and prints the
//! per-phase profile.
//!
//! Usage: `strata_frame [--config <file.toml>] [--frames <n>]`
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::process::ExitCode;

use strata_frame::{CliArgs, FrameConfig, FrameDriver, FrameResult, ProfileReport};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

fn print_usage() {
    println!("Usage: strata_frame [--config <file.toml>] [--frames <n>]");
    println!();
    println!("Options:");
    println!("  --config <path>  Load settings from a TOML file");
    println!("  --frames <n>     Override the number of frames to run");
}

fn run(args: &CliArgs) -> FrameResult<ProfileReport> {
    let config = match &args.config {
        Some(path) => FrameConfig::load(path)?,
        None => FrameConfig::default(),
    };
    let frames = args.frames.unwrap_or(config.frames);

    let mut driver = FrameDriver::new(config)?;
    tracing::info!(frames, "running frame loop");
    driver.run(frames)
}

fn print_report(report: &ProfileReport) {
    println!();
    println!(
        "{:<16} {:>8} {:>12} {:>12} {:>12}",
        "phase", "samples", "avg (us)", "min (us)", "max (us)"
    );
    for metrics in report.iter() {
        println!(
            "{:<16} {:>8} {:>12.1} {:>12.1} {:>12.1}",
            metrics.name(),
            metrics.samples(),
            metrics.average().as_secs_f64() * 1e6,
            metrics.min().as_secs_f64() * 1e6,
            metrics.max().as_secs_f64() * 1e6,
        );
    }
}

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().collect();
    let args = match CliArgs::parse(&raw) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("Error: {err}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };
    if args.help {
        print_usage();
        return ExitCode::SUCCESS;
    }

    init_tracing();

    match run(&args) {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "frame loop failed");
            ExitCode::FAILURE
        }
    }
}
