//! Metadata crawler configuration.

use std::time::Duration;

use crate::crawler::{BoundingBox, SpiralGrid};

use super::defaults::{
    DEFAULT_DRAIN_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENT_DOWNLOADS, DEFAULT_MAX_LAT,
    DEFAULT_MAX_LON, DEFAULT_MAX_METADATA_IN_FLIGHT, DEFAULT_MIN_LAT, DEFAULT_MIN_LON,
    DEFAULT_STEP_DEGREES,
};

/// Configuration for the metadata crawl.
///
/// # Example
///
/// ```
/// use birdseye::config::CrawlConfig;
/// use birdseye::crawler::BoundingBox;
///
/// let config = CrawlConfig::new(BoundingBox::new(-41.30, 174.76, -41.245, 174.81))
///     .with_steps(0.002, 0.002)
///     .with_max_metadata_in_flight(20);
/// assert_eq!(config.max_metadata_in_flight(), 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrawlConfig {
    bbox: BoundingBox,
    step_lat: f64,
    step_lon: f64,
    /// Maximum metadata requests in flight
    max_metadata_in_flight: usize,
    /// Queued images above which the crawl pauses (0 disables)
    max_pending_images: usize,
    /// Grace period for in-flight metadata requests after cancellation
    drain_timeout: Duration,
}

impl CrawlConfig {
    /// Create a crawl over `bbox` with default steps and limits.
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            step_lat: DEFAULT_STEP_DEGREES,
            step_lon: DEFAULT_STEP_DEGREES,
            max_metadata_in_flight: DEFAULT_MAX_METADATA_IN_FLIGHT,
            max_pending_images: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            drain_timeout: Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS),
        }
    }

    /// Set the grid step in degrees along each axis.
    pub fn with_steps(mut self, step_lat: f64, step_lon: f64) -> Self {
        self.step_lat = step_lat;
        self.step_lon = step_lon;
        self
    }

    /// Set the maximum number of metadata requests in flight.
    ///
    /// Default: 50.
    pub fn with_max_metadata_in_flight(mut self, max: usize) -> Self {
        self.max_metadata_in_flight = max;
        self
    }

    /// Set how many queued images pause the crawl.
    ///
    /// Default: the download ceiling (100).
    pub fn with_max_pending_images(mut self, max: usize) -> Self {
        self.max_pending_images = max;
        self
    }

    /// Set how long in-flight metadata requests may run after cancellation.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn step_lat(&self) -> f64 {
        self.step_lat
    }

    pub fn step_lon(&self) -> f64 {
        self.step_lon
    }

    pub fn max_metadata_in_flight(&self) -> usize {
        self.max_metadata_in_flight
    }

    pub fn max_pending_images(&self) -> usize {
        self.max_pending_images
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// The spiral traversal this configuration describes.
    pub fn grid(&self) -> SpiralGrid {
        SpiralGrid::new(self.bbox, self.step_lat, self.step_lon)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::new(BoundingBox::new(
            DEFAULT_MIN_LAT,
            DEFAULT_MIN_LON,
            DEFAULT_MAX_LAT,
            DEFAULT_MAX_LON,
        ))
    }
}
