mod cli;
mod error;

use std::process;

use clap::Parser;
use mkx_engine::{ExtractReport, extract_file};
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::Args,
    error::{AppError, Result},
};

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        error!("Application error: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;

    let specs = args.track_specs();
    let report = extract_file(&args.input, specs, args.config)?;
    log_report(&report);

    if report.is_success() {
        Ok(())
    } else {
        Err(AppError::TracksFailed {
            failed: report.failures.len(),
            total: report.tracks.len() + report.failures.len(),
        })
    }
}

fn log_report(report: &ExtractReport) {
    for track in &report.tracks {
        let keyframes = track
            .keyframes
            .map(|keyframes| format!(", {keyframes} key frames"))
            .unwrap_or_default();
        info!(
            track_id = track.track_id,
            frames = track.frames,
            "Track {} written to '{}' ({}, {} frames{keyframes})",
            track.track_id,
            track.output.display(),
            track.container,
            track.frames
        );
    }
    for failure in &report.failures {
        warn!(track_id = failure.track_id, "Track {} failed: {}", failure.track_id, failure.error);
    }
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}
