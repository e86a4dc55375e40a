//! Download scheduler configuration.

use std::time::Duration;

use super::defaults::{
    DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_DRAIN_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENT_DOWNLOADS,
    DEFAULT_MAX_PENDING_STITCH, DEFAULT_MIN_TILE_BYTES,
};

/// Configuration for tile downloading.
///
/// # Example
///
/// ```
/// use birdseye::config::DownloadConfig;
///
/// // Using defaults
/// let config = DownloadConfig::default();
/// assert_eq!(config.max_concurrent(), 100);
/// assert_eq!(config.min_tile_bytes(), 100);
///
/// // Custom configuration
/// let config = DownloadConfig::new()
///     .with_max_concurrent(16)
///     .with_max_pending_stitch(0);
/// assert_eq!(config.max_concurrent(), 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Maximum tile downloads in flight
    max_concurrent: usize,
    /// Tiles smaller than this are treated as corrupt
    min_tile_bytes: u64,
    /// HTTP request timeout in seconds
    timeout_secs: u64,
    /// Queued stitch jobs at which new images are deferred (0 disables)
    max_pending_stitch: usize,
    /// Grace period for in-flight fetches after cancellation
    drain_timeout: Duration,
}

impl DownloadConfig {
    /// Create a new download configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of tile downloads in flight.
    ///
    /// Default: 100.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Set the size below which a tile file is treated as corrupt.
    ///
    /// The same threshold decides re-downloads and counts valid tiles when
    /// judging completeness. Default: 100 bytes.
    pub fn with_min_tile_bytes(mut self, bytes: u64) -> Self {
        self.min_tile_bytes = bytes;
        self
    }

    /// Set the HTTP request timeout in seconds.
    ///
    /// Default: 30 seconds.
    pub fn with_timeout_secs(mut self, timeout: u64) -> Self {
        self.timeout_secs = timeout;
        self
    }

    /// Set how many queued stitch jobs defer new image downloads.
    ///
    /// Zero never defers. Default: 1.
    pub fn with_max_pending_stitch(mut self, pending: usize) -> Self {
        self.max_pending_stitch = pending;
        self
    }

    /// Set how long in-flight fetches may keep running after cancellation.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn min_tile_bytes(&self) -> u64 {
        self.min_tile_bytes
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn max_pending_stitch(&self) -> usize {
        self.max_pending_stitch
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            min_tile_bytes: DEFAULT_MIN_TILE_BYTES,
            timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            max_pending_stitch: DEFAULT_MAX_PENDING_STITCH,
            drain_timeout: Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS),
        }
    }
}
