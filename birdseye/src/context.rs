//! Shared pipeline context and run statistics.
//!
//! The `PipelineContext` carries what every pipeline component needs: where
//! the dataset lives, how to read it, where to report, what to count, and the
//! cancellation token that stops everything. It is cheaply cloneable for
//! passing into spawned tasks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::layout::DatasetLayout;
use crate::probe::FilesystemProbe;
use crate::reports::RunReports;

/// Shared context for pipeline components.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Disk state reader and tile writer
    pub probe: FilesystemProbe,

    /// Run artifacts
    pub reports: Arc<RunReports>,

    /// Run statistics
    pub stats: Arc<PipelineStats>,

    /// Cooperative cancellation for every loop and wait
    pub cancel: CancellationToken,
}

impl PipelineContext {
    /// Creates a context with fresh statistics.
    pub fn new(probe: FilesystemProbe, reports: RunReports, cancel: CancellationToken) -> Self {
        Self {
            probe,
            reports: Arc::new(reports),
            stats: Arc::new(PipelineStats::new()),
            cancel,
        }
    }

    /// The dataset layout.
    pub fn layout(&self) -> &DatasetLayout {
        self.probe.layout()
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Thread-safe run statistics.
///
/// Updated from any task, read once for the end-of-run summary.
///
/// # Example
///
/// ```
/// use birdseye::context::PipelineStats;
///
/// let stats = PipelineStats::new();
/// stats.record_tile_downloaded(20_000);
/// stats.record_tile_failed();
///
/// let snapshot = stats.snapshot();
/// assert_eq!(snapshot.tiles_downloaded, 1);
/// assert_eq!(snapshot.tiles_failed, 1);
/// ```
#[derive(Debug, Default)]
pub struct PipelineStats {
    metadata_requests: AtomicU64,
    metadata_failures: AtomicU64,
    images_discovered: AtomicU64,
    images_scheduled: AtomicU64,
    tiles_downloaded: AtomicU64,
    tiles_skipped: AtomicU64,
    tiles_failed: AtomicU64,
    bytes_downloaded: AtomicU64,
    images_incomplete: AtomicU64,
    stitches_queued: AtomicU64,
    stitches_succeeded: AtomicU64,
    stitches_failed: AtomicU64,
}

/// Snapshot of run statistics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub metadata_requests: u64,
    pub metadata_failures: u64,
    pub images_discovered: u64,
    pub images_scheduled: u64,
    pub tiles_downloaded: u64,
    pub tiles_skipped: u64,
    pub tiles_failed: u64,
    pub bytes_downloaded: u64,
    pub images_incomplete: u64,
    pub stitches_queued: u64,
    pub stitches_succeeded: u64,
    pub stitches_failed: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a metadata request being issued.
    pub fn record_metadata_request(&self) {
        self.metadata_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a metadata request that produced no usable record.
    pub fn record_metadata_failure(&self) {
        self.metadata_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an image id seen for the first time.
    pub fn record_image_discovered(&self) {
        self.images_discovered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an image accepted by the download scheduler.
    pub fn record_image_scheduled(&self) {
        self.images_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tile written to disk.
    pub fn record_tile_downloaded(&self, bytes: usize) {
        self.tiles_downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a tile already valid on disk.
    pub fn record_tile_skipped(&self) {
        self.tiles_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tile fetch or write that failed.
    pub fn record_tile_failed(&self) {
        self.tiles_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an image found with fewer valid tiles than expected.
    pub fn record_image_incomplete(&self) {
        self.images_incomplete.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stitch job entering the queue.
    pub fn record_stitch_queued(&self) {
        self.stitches_queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one mosaic tool run.
    pub fn record_stitch_result(&self, success: bool) {
        if success {
            self.stitches_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stitches_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            metadata_requests: self.metadata_requests.load(Ordering::Relaxed),
            metadata_failures: self.metadata_failures.load(Ordering::Relaxed),
            images_discovered: self.images_discovered.load(Ordering::Relaxed),
            images_scheduled: self.images_scheduled.load(Ordering::Relaxed),
            tiles_downloaded: self.tiles_downloaded.load(Ordering::Relaxed),
            tiles_skipped: self.tiles_skipped.load(Ordering::Relaxed),
            tiles_failed: self.tiles_failed.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            images_incomplete: self.images_incomplete.load(Ordering::Relaxed),
            stitches_queued: self.stitches_queued.load(Ordering::Relaxed),
            stitches_succeeded: self.stitches_succeeded.load(Ordering::Relaxed),
            stitches_failed: self.stitches_failed.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for PipelineStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "metadata {}/{} failed, images {} discovered/{} scheduled, \
             tiles {} downloaded/{} skipped/{} failed ({:.1} MB), \
             {} incomplete, stitches {} queued/{} ok/{} failed",
            self.metadata_failures,
            self.metadata_requests,
            self.images_discovered,
            self.images_scheduled,
            self.tiles_downloaded,
            self.tiles_skipped,
            self.tiles_failed,
            self.bytes_downloaded as f64 / 1_000_000.0,
            self.images_incomplete,
            self.stitches_queued,
            self.stitches_succeeded,
            self.stitches_failed
        )
    }
}
