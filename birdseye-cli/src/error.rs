//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use birdseye::config::ConfigFileError;
use birdseye::error::PipelineError;
use birdseye::provider::ProviderError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to read an input list
    Input { path: PathBuf, error: std::io::Error },
    /// Failed to create the HTTP client
    HttpClient(ProviderError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// The pipeline could not start
    Pipeline(PipelineError),
    /// Failed to write a file
    FileWrite { path: PathBuf, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Check the configuration file with: birdseye config show");
                eprintln!("Or write a fresh one with:         birdseye config init --force");
            }
            CliError::Pipeline(PipelineError::Prepare { .. }) => {
                eprintln!();
                eprintln!("Make sure [dataset] root points to a writable directory.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Input { path, error } => {
                write!(f, "Failed to read input list '{}': {}", path.display(), error)
            }
            CliError::HttpClient(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Pipeline(e) => write!(f, "Pipeline failed to start: {}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Input { error, .. } => Some(error),
            CliError::HttpClient(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

impl From<ProviderError> for CliError {
    fn from(e: ProviderError) -> Self {
        CliError::HttpClient(e)
    }
}
