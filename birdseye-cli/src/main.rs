//! Birdseye CLI - Command-line interface
//!
//! Crawls imagery metadata over a region, downloads the tiles of every image
//! found and hands complete images to the mosaic tool.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "birdseye")]
#[command(version = birdseye::VERSION)]
#[command(about = "Download and stitch birdseye aerial imagery", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.birdseye/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl metadata, download tiles and stitch complete images
    Run(RunArgs),

    /// Stitch every complete image in the dataset without downloading
    Reconcile,

    /// View or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args, config, cli.debug),
        Commands::Reconcile => commands::reconcile::run(config, cli.debug),
        Commands::Config { command } => commands::config::run(command, config),
    };

    if let Err(e) = result {
        e.exit();
    }
}
