//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization, runtime creation
//! and orchestrator wiring so command handlers stay small.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use birdseye::config::{config_file_path, ConfigFile};
use birdseye::logging::{init_logging, LoggingGuard};
use birdseye::mosaic::ExternalMosaicTool;
use birdseye::orchestrator::Orchestrator;
use birdseye::provider::AsyncReqwestClient;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
    /// Where the configuration was loaded from
    config_path: PathBuf,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing logging.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Config file to load instead of `~/.birdseye/config.ini`
    /// * `debug_mode` - When true, enables debug-level logging regardless of RUST_LOG
    pub fn new(config_path: Option<&Path>, debug_mode: bool) -> Result<Self, CliError> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path)?;

        let logging_guard = init_logging(&config.logging.file, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
            config_path,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("birdseye v{}", birdseye::VERSION);
        info!(
            config = %self.config_path.display(),
            root = %self.config.dataset.root.display(),
            "birdseye CLI: {} command",
            command
        );
    }

    /// Build the orchestrator described by the configuration.
    pub fn orchestrator(
        &self,
        cancel: CancellationToken,
    ) -> Result<Orchestrator<AsyncReqwestClient, ExternalMosaicTool>, CliError> {
        let config = &self.config;
        let layout = config.layout();
        let client = AsyncReqwestClient::with_timeout(config.download.timeout)?;
        let tool = ExternalMosaicTool::new(&config.mosaic.tool, layout.root());
        info!(tool = %tool.program().display(), "Mosaic tool");

        Ok(Orchestrator::new(layout, Arc::new(client), Arc::new(tool))
            .with_endpoints(config.endpoints())
            .with_crawl_config(config.crawl_config())
            .with_download_config(config.download_config())
            .with_mosaic_config(config.mosaic_config())
            .with_cancellation(cancel))
    }

    /// Create the multi-threaded runtime the pipeline runs on.
    pub fn runtime(&self) -> Result<Runtime, CliError> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)
    }
}

/// Cancels `cancel` on the first Ctrl+C.
///
/// Must be called from within a runtime.
pub fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, finishing in-flight work");
                println!("Interrupted, shutting down...");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });
}
