//! Reanalysis map pipeline CLI.
//!
//! Renders the contour, station, cluster and PCA images from a GRIB file,
//! a station page and a cluster table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use reanalysis_maps::{Pipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "reanalysis-maps")]
#[command(about = "Contour, station and cluster maps from JRA-55 reanalysis data")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "REANALYSIS_CONFIG", default_value = "config/reanalysis-maps.yaml")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output directory (overrides the configuration)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every image (default)
    Run,
    /// List the records of a GRIB file
    Inventory {
        /// GRIB file (defaults to the configured input)
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = PipelineConfig::load(Some(&args.config))?;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(config),
        Command::Inventory { file } => inventory(file.unwrap_or(config.grib.path)),
    }
}

fn run(config: PipelineConfig) -> Result<()> {
    info!(output_dir = %config.output_dir.display(), "Starting reanalysis map run");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let pipeline = Pipeline::new(config)?;
    let summary = runtime.block_on(pipeline.run())?;

    for image in &summary.images {
        println!("{}", image.display());
    }
    Ok(())
}

fn inventory(path: PathBuf) -> Result<()> {
    let entries = grib_reader::inventory(&path)
        .with_context(|| format!("Failed to read GRIB inventory from {:?}", path))?;
    for (info, ni, nj) in &entries {
        println!("{}:{}x{}", info, ni, nj);
    }
    info!(path = %path.display(), records = entries.len(), "Listed GRIB records");
    Ok(())
}
