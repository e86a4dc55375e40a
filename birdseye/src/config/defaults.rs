//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::path::PathBuf;

use super::settings::*;
use crate::provider::{
    DEFAULT_CATALOG_ID, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_METADATA_HOST, DEFAULT_QUERY_SUFFIX,
    DEFAULT_TILE_HOST,
};

// =============================================================================
// Crawl
// =============================================================================

/// Default bounding box corners (central Wellington).
pub const DEFAULT_MIN_LAT: f64 = -41.30;
pub const DEFAULT_MIN_LON: f64 = 174.76;
pub const DEFAULT_MAX_LAT: f64 = -41.245;
pub const DEFAULT_MAX_LON: f64 = 174.81;

/// Default grid step in degrees along both axes.
pub const DEFAULT_STEP_DEGREES: f64 = 0.001;

/// Default ceiling on metadata requests in flight.
pub const DEFAULT_MAX_METADATA_IN_FLIGHT: usize = 50;

// =============================================================================
// Download
// =============================================================================

/// Default ceiling on tile downloads in flight.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 100;

/// Default size in bytes below which a tile is treated as corrupt.
pub const DEFAULT_MIN_TILE_BYTES: u64 = crate::probe::DEFAULT_MIN_TILE_BYTES;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = DEFAULT_HTTP_TIMEOUT_SECS;

/// Default number of queued stitch jobs that defers new image downloads.
pub const DEFAULT_MAX_PENDING_STITCH: usize = 1;

/// Default time allowed for in-flight fetches to finish after cancellation.
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Mosaic
// =============================================================================

/// Default mosaic tool, resolved against the dataset root.
pub const DEFAULT_MOSAIC_TOOL: &str = "stitch.bat";

/// Default number of mosaic workers.
pub const DEFAULT_MOSAIC_WORKERS: usize = 4;

// =============================================================================
// Paths
// =============================================================================

/// Default log file name.
pub const DEFAULT_LOG_FILE_NAME: &str = "birdseye.log";

/// Get the default dataset root (~/birdseye-data).
pub fn default_dataset_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("birdseye-data")
}

/// Get the default log file (~/.birdseye/birdseye.log).
pub fn default_log_file() -> PathBuf {
    super::file::config_directory().join(DEFAULT_LOG_FILE_NAME)
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            dataset: DatasetSettings {
                root: default_dataset_root(),
            },
            crawl: CrawlSettings {
                min_lat: DEFAULT_MIN_LAT,
                min_lon: DEFAULT_MIN_LON,
                max_lat: DEFAULT_MAX_LAT,
                max_lon: DEFAULT_MAX_LON,
                step_lat: DEFAULT_STEP_DEGREES,
                step_lon: DEFAULT_STEP_DEGREES,
                max_metadata_in_flight: DEFAULT_MAX_METADATA_IN_FLIGHT,
            },
            metadata: MetadataSettings {
                host: DEFAULT_METADATA_HOST.to_string(),
                api_key: None,
            },
            tiles: TileSettings {
                host: DEFAULT_TILE_HOST.to_string(),
                catalog_id: DEFAULT_CATALOG_ID.to_string(),
                query_suffix: DEFAULT_QUERY_SUFFIX.to_string(),
            },
            download: DownloadSettings {
                max_concurrent: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
                min_tile_bytes: DEFAULT_MIN_TILE_BYTES,
                timeout: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
                max_pending_stitch: DEFAULT_MAX_PENDING_STITCH,
            },
            mosaic: MosaicSettings {
                tool: PathBuf::from(DEFAULT_MOSAIC_TOOL),
                workers: DEFAULT_MOSAIC_WORKERS,
            },
            logging: LoggingSettings {
                file: default_log_file(),
            },
        }
    }
}
