//! Configuration management CLI commands.
//!
//! Provides `config path`, `config init` and `config show`.

use std::path::{Path, PathBuf};

use birdseye::config::{config_file_path, ConfigFile};
use clap::Subcommand;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config: Option<&Path>) -> Result<(), CliError> {
    let path = config
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);
    match command {
        ConfigCommands::Path => run_path(&path),
        ConfigCommands::Init { force } => run_init(&path, force),
        ConfigCommands::Show => run_show(&path),
    }
}

fn run_path(path: &Path) -> Result<(), CliError> {
    println!("{}", path.display());
    Ok(())
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    init_config(path, force)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Writes the default configuration unless one exists and `force` is unset.
fn init_config(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use 'birdseye config init --force' to overwrite it.",
            path.display()
        )));
    }
    ConfigFile::default()
        .save_to(path)
        .map_err(|e| CliError::FileWrite {
            path: PathBuf::from(path),
            error: std::io::Error::other(e.to_string()),
        })
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# {} (not found, showing defaults)", path.display());
    }
    print!("{}", config.to_ini_string());
    Ok(())
}
