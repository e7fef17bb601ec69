mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coreg", about = "Global co-registration of georeferenced raster images")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show raster metadata (size, grid, projection, nodata)
    Info(commands::info::InfoArgs),
    /// Estimate the shift of a target image relative to a reference
    Detect(commands::detect::DetectArgs),
    /// Estimate the shift and write the corrected target
    Correct(commands::correct::CorrectArgs),
    /// Process a TOML list of image pairs in parallel
    Batch(commands::batch::BatchArgs),
    /// Print or save a default config file
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Detect(args) => commands::detect::run(args),
        Commands::Correct(args) => commands::correct::run(args),
        Commands::Batch(args) => commands::batch::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
