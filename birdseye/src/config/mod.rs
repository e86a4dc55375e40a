//! Configuration types for birdseye components.
//!
//! Two layers live here:
//!
//! - [`ConfigFile`]: the user's `~/.birdseye/config.ini`, one settings struct
//!   per `[section]`, parsed over defaults
//! - component configs ([`CrawlConfig`], [`DownloadConfig`], [`MosaicConfig`]):
//!   plain builder-style structs handed to the pipeline, derived from a
//!   `ConfigFile` or built directly
//!
//! # Example
//!
//! ```
//! use birdseye::config::{ConfigFile, DownloadConfig};
//!
//! let file = ConfigFile::default();
//! let download = file.download_config();
//! assert_eq!(download, DownloadConfig::default());
//! ```

mod crawl;
mod defaults;
mod download;
mod file;
mod mosaic;
mod parser;
mod settings;
mod writer;

pub use crawl::CrawlConfig;
pub use download::DownloadConfig;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use mosaic::MosaicConfig;

pub use defaults::{
    default_dataset_root, default_log_file, DEFAULT_DOWNLOAD_TIMEOUT_SECS,
    DEFAULT_DRAIN_TIMEOUT_SECS, DEFAULT_LOG_FILE_NAME, DEFAULT_MAX_CONCURRENT_DOWNLOADS,
    DEFAULT_MAX_LAT, DEFAULT_MAX_LON, DEFAULT_MAX_METADATA_IN_FLIGHT, DEFAULT_MAX_PENDING_STITCH,
    DEFAULT_MIN_LAT, DEFAULT_MIN_LON, DEFAULT_MIN_TILE_BYTES, DEFAULT_MOSAIC_TOOL,
    DEFAULT_MOSAIC_WORKERS, DEFAULT_STEP_DEGREES,
};
pub use settings::{
    ConfigFile, CrawlSettings, DatasetSettings, DownloadSettings, LoggingSettings,
    MetadataSettings, MosaicSettings, TileSettings,
};
