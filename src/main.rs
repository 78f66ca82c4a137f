use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueHint};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gpx2csv::options::ConvertOptions;
use gpx2csv::selector::{self, InputSelection};

const SEPARATOR: &str =
    "----------------------------------------------------------------------------------";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Convert GPX tracks to CSV tables with sun altitude, azimuth and clear-sky radiation",
    long_about = None
)]
struct Cli {
    /// A single .gpx file to convert
    #[arg(long, value_hint = ValueHint::FilePath)]
    file: Option<PathBuf>,

    /// A folder of .gpx files to batch convert
    #[arg(long, value_hint = ValueHint::DirPath)]
    folder: Option<PathBuf>,

    /// Optional JSON options file
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();

    info!("{SEPARATOR}");
    run(cli)
}

fn run(cli: Cli) -> Result<ExitCode> {
    let start = Instant::now();

    let opts = match &cli.config {
        Some(path) => ConvertOptions::from_file(path)
            .with_context(|| format!("failed to load options from {}", path.display()))?,
        None => ConvertOptions::default(),
    };

    let selection = selector::resolve(cli.file, cli.folder);
    match &selection {
        InputSelection::SingleFile(_) => info!("Attempting a single file conversion"),
        InputSelection::Folder(_) => info!("Attempting a batch file conversion"),
        InputSelection::Invalid(usage) => {
            warn!("{usage}");
            warn!("Run gpx2csv --help for more information.");
            return Ok(ExitCode::FAILURE);
        }
    }

    let files = selector::track_files(&selection, &opts).context("failed to list track files")?;
    info!(
        "Found {} .{} files to convert.",
        files.len(),
        opts.track_extension
    );

    for (i, file) in files.iter().enumerate() {
        info!("{} / {}", i, files.len());
        gpx2csv::convert_file(file, &opts)
            .with_context(|| format!("failed to convert {}", file.display()))?;
        info!("{SEPARATOR}");
    }

    let minutes = start.elapsed().as_secs_f64() / 60.0;
    info!(
        "Finished converting all .{} files to .csv files.",
        opts.track_extension
    );
    info!("Processing time: {minutes:.6} minutes");
    info!("You can find all generated .csv files next to their originals");
    Ok(ExitCode::SUCCESS)
}
