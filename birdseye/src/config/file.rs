//! Configuration file handling for ~/.birdseye/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::settings::ConfigFile;

use super::{CrawlConfig, DownloadConfig, MosaicConfig};
use crate::crawler::BoundingBox;
use crate::layout::DatasetLayout;
use crate::provider::BirdseyeEndpoints;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.birdseye/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Render the configuration as INI text, as `save_to` would write it.
    pub fn to_ini_string(&self) -> String {
        super::writer::to_config_string(self)
    }

    /// Dataset layout rooted at the configured directory.
    pub fn layout(&self) -> DatasetLayout {
        DatasetLayout::new(&self.dataset.root)
    }

    /// Tile and metadata URL builder.
    pub fn endpoints(&self) -> BirdseyeEndpoints {
        BirdseyeEndpoints::default()
            .with_tile_host(&self.tiles.host)
            .with_catalog_id(&self.tiles.catalog_id)
            .with_query_suffix(&self.tiles.query_suffix)
            .with_metadata_host(&self.metadata.host)
            .with_api_key(self.metadata.api_key.as_deref().unwrap_or(""))
    }

    /// Metadata crawler configuration.
    ///
    /// The crawler backs off while more images are queued than the download
    /// ceiling.
    pub fn crawl_config(&self) -> CrawlConfig {
        let crawl = &self.crawl;
        CrawlConfig::new(BoundingBox::new(
            crawl.min_lat,
            crawl.min_lon,
            crawl.max_lat,
            crawl.max_lon,
        ))
        .with_steps(crawl.step_lat, crawl.step_lon)
        .with_max_metadata_in_flight(crawl.max_metadata_in_flight)
        .with_max_pending_images(self.download.max_concurrent)
    }

    /// Download scheduler configuration.
    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig::new()
            .with_max_concurrent(self.download.max_concurrent)
            .with_min_tile_bytes(self.download.min_tile_bytes)
            .with_timeout_secs(self.download.timeout)
            .with_max_pending_stitch(self.download.max_pending_stitch)
    }

    /// Mosaic dispatcher configuration.
    pub fn mosaic_config(&self) -> MosaicConfig {
        MosaicConfig::new()
            .with_tool(&self.mosaic.tool)
            .with_workers(self.mosaic.workers)
    }
}

/// Get the path to the config directory (~/.birdseye).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".birdseye")
}

/// Get the path to the config file (~/.birdseye/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
