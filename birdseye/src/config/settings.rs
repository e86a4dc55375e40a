//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Dataset location
    pub dataset: DatasetSettings,
    /// Metadata crawl area and throttling
    pub crawl: CrawlSettings,
    /// Metadata service
    pub metadata: MetadataSettings,
    /// Tile service
    pub tiles: TileSettings,
    /// Tile download behaviour
    pub download: DownloadSettings,
    /// Mosaic tool
    pub mosaic: MosaicSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Dataset configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSettings {
    /// Root directory holding zoom directories and run artifacts
    pub root: PathBuf,
}

/// Crawl configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSettings {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
    /// Grid step in degrees of latitude
    pub step_lat: f64,
    /// Grid step in degrees of longitude
    pub step_lon: f64,
    /// Maximum metadata requests in flight
    pub max_metadata_in_flight: usize,
}

/// Metadata service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataSettings {
    /// REST host
    pub host: String,
    /// API key sent with every metadata request
    pub api_key: Option<String>,
}

/// Tile service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSettings {
    pub host: String,
    pub catalog_id: String,
    pub query_suffix: String,
}

/// Download configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSettings {
    /// Maximum tile downloads in flight
    pub max_concurrent: usize,
    /// Tiles smaller than this many bytes are treated as corrupt
    pub min_tile_bytes: u64,
    /// Timeout in seconds for HTTP requests
    pub timeout: u64,
    /// Queued stitch jobs at which new image downloads are deferred (0 disables)
    pub max_pending_stitch: usize,
}

/// Mosaic tool configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicSettings {
    /// Mosaic tool executable; relative paths resolve against the dataset root
    pub tool: PathBuf,
    /// Number of concurrent mosaic workers
    pub workers: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
