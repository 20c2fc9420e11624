//! CTRK Decoder CLI Application
//!
//! Command-line front end for the ctrk-decoder library. It adds:
//! - Batch decoding of many files in parallel
//! - TOML configuration with command-line overrides
//! - JSON/CSV export in raw or engineering units

use anyhow::Result;
use clap::Parser;
use ctrk_decoder::Decoder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

mod config;
mod export;

use config::{AppConfig, OutputFormat};

/// CTRK Decoder - Convert CTRK telemetry logs to JSON or CSV
#[derive(Parser, Debug)]
#[command(name = "ctrk-cli")]
#[command(about = "Decode CTRK motorcycle telemetry logs", long_about = None)]
#[command(version)]
struct Args {
    /// CTRK files to decode
    #[arg(value_name = "FILE")]
    inputs: Vec<PathBuf>,

    /// Directory for output files (default: next to each input)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Write raw channel integers instead of engineering units
    #[arg(long)]
    raw: bool,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CTRK Decoder CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", ctrk_decoder::VERSION);

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    let config = apply_overrides(config, &args);

    if config.input.files.is_empty() {
        anyhow::bail!("No input files given (pass FILE arguments or set [input] files in the config)");
    }

    if let Some(dir) = &config.output.output_dir {
        std::fs::create_dir_all(dir)?;
    }

    let decoder = Decoder::with_config(config.decoder.clone());

    let failures: Vec<(PathBuf, anyhow::Error)> = config
        .input
        .files
        .par_iter()
        .filter_map(|input| {
            process_file(&decoder, input, &config)
                .err()
                .map(|e| (input.clone(), e))
        })
        .collect();

    for (input, err) in &failures {
        log::error!("{:?}: {:#}", input, err);
    }

    if !failures.is_empty() {
        anyhow::bail!(
            "{} of {} file(s) failed to decode",
            failures.len(),
            config.input.files.len()
        );
    }

    Ok(())
}

/// Command-line flags take precedence over the config file
fn apply_overrides(mut config: AppConfig, args: &Args) -> AppConfig {
    if !args.inputs.is_empty() {
        config.input.files = args.inputs.clone();
    }
    if let Some(dir) = &args.output {
        config.output.output_dir = Some(dir.clone());
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if args.raw {
        config.output.raw = true;
    }
    config
}

fn process_file(decoder: &Decoder, input: &Path, config: &AppConfig) -> Result<()> {
    let output = decoder.decode_file(input)?;
    let path = export::output_path(
        input,
        config.output.output_dir.as_deref(),
        config.output.format,
    );
    export::write_output(&output, &path, config.output.format, config.output.raw)?;

    if output.records.is_empty() {
        log::warn!("{:?}: no GPRMC sentence found, nothing emitted", input);
    }

    println!(
        "{} -> {}: {} records, {} lap(s), {} lap marker(s), stopped: {}",
        input.display(),
        path.display(),
        output.records.len(),
        output.lap_count,
        output.lap_markers.len(),
        output.stats.stop_reason
    );
    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
