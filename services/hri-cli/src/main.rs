//! Urban heat risk index command-line runner.
//!
//! Resolves an extent, runs the eight-stage pipeline against the ArcGIS
//! services from the configuration and reports the resulting bin table.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use hri_common::Color;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hri-cli")]
#[command(about = "Urban heat risk index over hexagon bins")]
struct Cli {
    /// Configuration file (YAML); HRI_* environment variables override it
    #[arg(short, long, global = true, env = "HRI_CONFIG")]
    config: Option<PathBuf>,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the index for one extent
    Run(RunArgs),
    /// Print the class-breaks renderer for the HRI field
    Renderer(RendererArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Extent as "xmin,ymin,xmax,ymax" in the units of --wkid
    #[arg(long, requires = "wkid", conflicts_with = "envelope")]
    pub bbox: Option<String>,

    /// Spatial reference of --bbox (projected, e.g. 32632)
    #[arg(long)]
    pub wkid: Option<u32>,

    /// Esri JSON envelope file with a spatialReference
    #[arg(long, required_unless_present = "bbox")]
    pub envelope: Option<PathBuf>,

    /// Parent directory of the run workspace
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Keep intermediate rasters in the workspace
    #[arg(long)]
    pub retain_workspace: bool,

    /// Print the run summary as JSON instead of the output path
    #[arg(long)]
    pub json: bool,

    /// Also log bins whose HRI exceeds this value, grouped by rounded HRI
    #[arg(long)]
    pub high_risk: Option<f64>,
}

#[derive(Args, Debug)]
pub struct RendererArgs {
    /// Number of equal-interval classes
    #[arg(long, default_value = "5")]
    pub classes: usize,

    /// Fill of the lowest class, #RRGGBB or #RRGGBBAA
    #[arg(long, default_value = "#FFFFB2")]
    pub low_color: Color,

    /// Fill of the highest class
    #[arg(long, default_value = "#BD0026")]
    pub high_color: Color,
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if format == "json" {
        builder.json().try_init().map_err(|e| anyhow::anyhow!(e))?;
    } else {
        builder.try_init().map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Command::Run(args) => commands::run(cli.config.as_deref(), args).await,
        Command::Renderer(args) => commands::renderer(cli.config.as_deref(), args),
    }
}
