//! lasfilter CLI application.
//!
//! Filters LAS files by height and writes LAS, CSV or text output.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use env_logger::Builder;
use indicatif::{ProgressBar, ProgressStyle};
use lasfilter_core::{
    move_to_downloads, process, ExtentPolicy, OutputFormat, ProcessingConfig, ReportKind,
};
use log::LevelFilter;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

/// Height threshold filter for LAS point cloud files.
///
/// Keeps the points whose Z is at or above POINTS_TO_RENDER percent of the
/// file's height range. Inputs that are not .las files are copied unchanged.
#[derive(Parser, Debug)]
#[command(name = "lasfilter")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file path (.las is filtered, anything else is copied)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file path
    ///
    /// The extension is replaced to match --format.
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Output format: .las, .txt or .csv
    #[arg(short, long, default_value = ".las")]
    format: OutputFormat,

    /// Height percentile used as threshold (10-100)
    #[arg(
        short,
        long = "points-to-render",
        default_value_t = 10.0,
        value_parser = parse_points_to_render
    )]
    points_to_render: f64,

    /// Write the bounding box of the retained points instead of the source's
    #[arg(long)]
    recompute_extents: bool,

    /// Move the result to ~/Downloads afterwards
    #[arg(long)]
    move_to_downloads: bool,

    /// Log debug details
    #[arg(short, long)]
    verbose: bool,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn parse_points_to_render(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{}", e))?;
    ProcessingConfig::new(OutputFormat::Las, value)
        .validate()
        .map_err(|e| e.to_string())?;
    Ok(value)
}

fn init_logging(args: &Args) {
    let level = if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let extents = if args.recompute_extents {
        ExtentPolicy::Recompute
    } else {
        ExtentPolicy::Preserve
    };
    let config = ProcessingConfig::new(args.format, args.points_to_render).with_extents(extents);
    config.validate().context("Invalid processing settings")?;

    // Setup progress bar
    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .context("Invalid progress template")?,
        );
        pb
    };

    let start_time = Instant::now();

    progress.set_message(format!(
        "Processing {:?}...",
        args.input.file_name().unwrap_or_default()
    ));

    let report = process(&args.input, &args.output, &config)
        .with_context(|| format!("Failed to process {}", args.input.display()))?;

    let mut final_path = report.output_path.clone();
    if args.move_to_downloads {
        final_path = move_to_downloads(&report.output_path)
            .context("Failed to move the result to Downloads")?;
    }

    let total_duration = start_time.elapsed();
    progress.finish_with_message(format!("{} in {:.2}s", report, total_duration.as_secs_f64()));

    if !args.quiet {
        // Print summary
        eprintln!();
        eprintln!("Summary:");
        eprintln!("  Input:        {:?}", args.input);
        eprintln!("  Output:       {:?}", final_path);
        match report.kind {
            ReportKind::Filtered {
                points_read,
                points_written,
                threshold,
            } => {
                eprintln!("  Points read:  {}", points_read);
                eprintln!("  Kept:         {}", points_written);
                eprintln!("  Threshold:    z >= {:.3}", threshold);
            }
            ReportKind::Copied { bytes } => {
                eprintln!("  Copied:       {} bytes (not a LAS file)", bytes);
            }
        }
        eprintln!("  Duration:     {:.3}s", total_duration.as_secs_f64());
    }

    Ok(())
}
