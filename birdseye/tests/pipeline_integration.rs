//! Integration tests for the acquisition pipeline.
//!
//! These tests drive the orchestrator end to end against a scripted HTTP
//! client and a mosaic tool that records its invocations:
//! - Downloading, completion and stitching of seeded images
//! - Re-runs over an existing dataset
//! - Corrupt and missing tile recovery
//! - Metadata crawl deduplication
//! - Offline reconciliation
//! - Cancellation

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use birdseye::config::{CrawlConfig, DownloadConfig, MosaicConfig};
use birdseye::crawler::BoundingBox;
use birdseye::layout::DatasetLayout;
use birdseye::mosaic::{MosaicError, MosaicTool, StitchJob};
use birdseye::orchestrator::Orchestrator;
use birdseye::provider::{AsyncHttpClient, BirdseyeEndpoints, ProviderError};
use birdseye::tile::ImageKey;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Test Helpers
// =============================================================================

const TILE_HOST: &str = "http://tiles.test";
const CATALOG: &str = "a";
const METADATA_HOST: &str = "http://meta.test";
const TILE_BYTES: usize = 512;

fn endpoints() -> BirdseyeEndpoints {
    BirdseyeEndpoints::default()
        .with_tile_host(TILE_HOST)
        .with_catalog_id(CATALOG)
        .with_query_suffix("?g=1")
        .with_metadata_host(METADATA_HOST)
        .with_api_key("test-key")
}

/// Serves tiles for every image and metadata documents per heading.
#[derive(Default)]
struct FakeImageryService {
    /// Heading -> image id returned for that heading.
    headings: Vec<(u16, u64)>,
    /// Tile indices that fail with an HTTP error.
    failing_tiles: HashSet<u32>,
    requests: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeImageryService {
    fn new() -> Self {
        Self::default()
    }

    fn with_heading(mut self, heading: u16, image_id: u64) -> Self {
        self.headings.push((heading, image_id));
        self
    }

    fn failing_tiles(mut self, indices: &[u32]) -> Self {
        self.failing_tiles.extend(indices.iter().copied());
        self
    }

    fn tile_requests(&self) -> Vec<(u64, u8, u32)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|url| parse_tile_url(url))
            .collect()
    }

    fn metadata_requests(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.starts_with(METADATA_HOST))
            .count()
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn respond(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        if url.starts_with(METADATA_HOST) {
            return self
                .headings
                .iter()
                .find(|(heading, _)| url.contains(&format!("dir={}&", heading)))
                .map(|&(_, id)| metadata_document(id).into_bytes())
                .ok_or_else(|| ProviderError::HttpError("HTTP 404".to_string()));
        }

        match parse_tile_url(url) {
            Some((_, _, index)) if self.failing_tiles.contains(&index) => {
                Err(ProviderError::HttpError("HTTP 503".to_string()))
            }
            Some(_) => Ok(vec![0xFF; TILE_BYTES]),
            None => Err(ProviderError::InvalidResponse(format!("unexpected URL {}", url))),
        }
    }
}

impl AsyncHttpClient for FakeImageryService {
    async fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(url.to_string());
        self.respond(url)
    }
}

/// Parses `http://tiles.test/a-{id}-{zoom}-{index}?g=1`.
fn parse_tile_url(url: &str) -> Option<(u64, u8, u32)> {
    let rest = url.strip_prefix(&format!("{}/{}-", TILE_HOST, CATALOG))?;
    let rest = rest.split('?').next()?;
    let mut parts = rest.split('-');
    let id = parts.next()?.parse().ok()?;
    let zoom = parts.next()?.parse().ok()?;
    let index = parts.next()?.parse().ok()?;
    Some((id, zoom, index))
}

fn metadata_document(image_id: u64) -> String {
    serde_json::json!({
        "resourceSets": [{
            "resources": [{
                "imageUrl": format!(
                    "http://ak.t0.tiles.virtualearth.net/tiles/o31311100030-{}-20-{{tileId}}?g=5197",
                    image_id
                ),
                "bes": {
                    "bec": {
                        "qcx": -4780000.5, "qcy": 435000.25, "qcz": -4190000.0,
                        "qdx": 0.1, "qdy": 0.2, "qdz": -0.9,
                        "qex": 0.0, "qey": 1.0, "qez": 0.0,
                        "ol": 412.5, "olt": -41.2731, "olg": 174.7842
                    },
                    "bei": { "pcd": "2013-05-17T10:21:00" }
                }
            }]
        }]
    })
    .to_string()
}

/// Mosaic tool that records arguments and writes the combined image.
struct RecordingMosaicTool {
    root: PathBuf,
    jobs: Mutex<Vec<String>>,
}

impl RecordingMosaicTool {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            jobs: Mutex::new(Vec::new()),
        }
    }

    fn jobs(&self) -> Vec<String> {
        self.jobs.lock().unwrap().clone()
    }
}

impl MosaicTool for RecordingMosaicTool {
    async fn combine(&self, job: &StitchJob) -> Result<(), MosaicError> {
        self.jobs.lock().unwrap().push(job.argument());
        let image = job.image();
        let path = DatasetLayout::new(&self.root).mosaic_path(image);
        fs::write(path, b"mosaic").expect("write mosaic");
        Ok(())
    }
}

fn orchestrator(
    root: &Path,
    client: &Arc<FakeImageryService>,
    tool: &Arc<RecordingMosaicTool>,
) -> Orchestrator<FakeImageryService, RecordingMosaicTool> {
    Orchestrator::new(DatasetLayout::new(root), Arc::clone(client), Arc::clone(tool))
        .with_endpoints(endpoints())
        .with_download_config(DownloadConfig::new().with_max_concurrent(8))
        .with_mosaic_config(MosaicConfig::new().with_workers(2))
}

fn write_tiles(root: &Path, image: ImageKey, sizes: impl Fn(u32) -> Option<usize>) {
    let layout = DatasetLayout::new(root);
    fs::create_dir_all(layout.image_dir(image)).unwrap();
    for tile in image.tiles() {
        if let Some(size) = sizes(tile.index()) {
            fs::write(layout.tile_path(tile), vec![0xAA; size]).unwrap();
        }
    }
}

fn image(id: u64) -> ImageKey {
    ImageKey::new(id, 20).unwrap()
}

// =============================================================================
// Seeded Runs
// =============================================================================

#[tokio::test]
async fn test_seeded_image_downloaded_and_stitched_once() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(FakeImageryService::new());
    let tool = Arc::new(RecordingMosaicTool::new(temp.path()));

    let summary = orchestrator(temp.path(), &client, &tool)
        .run(&[image(42)], false)
        .await
        .unwrap();

    assert!(!summary.cancelled);
    assert_eq!(summary.stats.tiles_downloaded, 192);
    assert_eq!(client.tile_requests().len(), 192);
    assert_eq!(client.metadata_requests(), 0);
    assert_eq!(tool.jobs(), vec!["20\\42 16".to_string()]);

    let layout = DatasetLayout::new(temp.path());
    assert!(layout.mosaic_path(image(42)).exists());
    assert!(layout.tile_path(image(42).tile(191).unwrap()).exists());
}

#[tokio::test]
async fn test_rerun_over_complete_dataset_is_idle() {
    let temp = TempDir::new().unwrap();
    let first_client = Arc::new(FakeImageryService::new());
    let tool = Arc::new(RecordingMosaicTool::new(temp.path()));

    orchestrator(temp.path(), &first_client, &tool)
        .run(&[image(42)], false)
        .await
        .unwrap();
    assert_eq!(tool.jobs().len(), 1);

    let second_client = Arc::new(FakeImageryService::new());
    let summary = orchestrator(temp.path(), &second_client, &tool)
        .run(&[image(42)], false)
        .await
        .unwrap();

    assert_eq!(second_client.call_count(), 0);
    assert_eq!(summary.stats.tiles_skipped, 192);
    assert_eq!(tool.jobs().len(), 1, "up-to-date mosaic must not be rebuilt");
    assert_eq!(summary.sweep.unwrap().up_to_date, 1);
}

#[tokio::test]
async fn test_corrupt_tile_is_downloaded_again() {
    let temp = TempDir::new().unwrap();
    write_tiles(temp.path(), image(7), |index| {
        Some(if index == 5 { 10 } else { TILE_BYTES })
    });
    let client = Arc::new(FakeImageryService::new());
    let tool = Arc::new(RecordingMosaicTool::new(temp.path()));

    let summary = orchestrator(temp.path(), &client, &tool)
        .run(&[image(7)], false)
        .await
        .unwrap();

    assert_eq!(client.tile_requests(), vec![(7, 20, 5)]);
    assert_eq!(summary.stats.tiles_skipped, 191);
    assert_eq!(tool.jobs(), vec!["20\\7 16".to_string()]);

    let tile = DatasetLayout::new(temp.path()).tile_path(image(7).tile(5).unwrap());
    assert_eq!(fs::metadata(tile).unwrap().len(), TILE_BYTES as u64);
}

#[tokio::test]
async fn test_failed_tiles_block_stitching_until_recovered() {
    let temp = TempDir::new().unwrap();
    let tool = Arc::new(RecordingMosaicTool::new(temp.path()));

    let flaky = Arc::new(FakeImageryService::new().failing_tiles(&[7, 100]));
    let first = orchestrator(temp.path(), &flaky, &tool)
        .run(&[image(9001)], false)
        .await
        .unwrap();

    assert_eq!(first.stats.tiles_downloaded, 190);
    assert_eq!(first.stats.tiles_failed, 2);
    assert!(tool.jobs().is_empty());
    assert_eq!(first.sweep.unwrap().incomplete, 1);

    let layout = DatasetLayout::new(temp.path());
    let errors = fs::read_to_string(layout.errors_log_path()).unwrap();
    assert!(errors.contains("HTTP 503"));

    let healthy = Arc::new(FakeImageryService::new());
    let second = orchestrator(temp.path(), &healthy, &tool)
        .run(&[image(9001)], false)
        .await
        .unwrap();

    let mut fetched: Vec<u32> = healthy
        .tile_requests()
        .into_iter()
        .map(|(_, _, index)| index)
        .collect();
    fetched.sort_unstable();
    assert_eq!(fetched, vec![7, 100]);
    assert_eq!(second.stats.tiles_downloaded, 2);
    assert_eq!(tool.jobs(), vec!["20\\9001 16".to_string()]);
}

// =============================================================================
// Crawl
// =============================================================================

#[tokio::test]
async fn test_crawl_schedules_image_seen_from_two_headings_once() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(
        FakeImageryService::new()
            .with_heading(0, 123456)
            .with_heading(45, 123456),
    );
    let tool = Arc::new(RecordingMosaicTool::new(temp.path()));

    let crawl = CrawlConfig::new(BoundingBox::new(-41.0, 174.0, -41.0004, 174.0004))
        .with_steps(0.001, 0.001);
    let summary = orchestrator(temp.path(), &client, &tool)
        .with_crawl_config(crawl)
        .run(&[], true)
        .await
        .unwrap();

    assert_eq!(client.metadata_requests(), 8);
    assert_eq!(summary.stats.images_scheduled, 1);
    assert_eq!(client.tile_requests().len(), 192);
    assert_eq!(tool.jobs(), vec!["20\\123456 16".to_string()]);

    let layout = DatasetLayout::new(temp.path());
    assert!(layout.metadata_json_path(123456).exists());
    let index = fs::read_to_string(layout.metadata_index_path()).unwrap();
    assert!(index.contains("123456"));
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_reconcile_only_stitches_complete_stale_images() {
    let temp = TempDir::new().unwrap();
    let layout = DatasetLayout::new(temp.path());

    write_tiles(temp.path(), image(77), |_| Some(TILE_BYTES));
    write_tiles(temp.path(), image(78), |index| (index < 100).then_some(TILE_BYTES));
    write_tiles(temp.path(), image(79), |_| Some(TILE_BYTES));
    fs::write(layout.mosaic_path(image(79)), b"mosaic").unwrap();

    let client = Arc::new(FakeImageryService::new());
    let tool = Arc::new(RecordingMosaicTool::new(temp.path()));

    let summary = orchestrator(temp.path(), &client, &tool)
        .reconcile_only()
        .await
        .unwrap();

    let sweep = summary.sweep.unwrap();
    assert_eq!(sweep.images_checked, 3);
    assert_eq!(sweep.queued, 1);
    assert_eq!(sweep.incomplete, 1);
    assert_eq!(sweep.up_to_date, 1);
    assert_eq!(tool.jobs(), vec!["20\\77 16".to_string()]);
    assert_eq!(client.call_count(), 0);

    let missing = fs::read_to_string(layout.missing_tiles_path()).unwrap();
    assert!(missing.contains("78"));
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancelled_run_skips_sweep() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(FakeImageryService::new());
    let tool = Arc::new(RecordingMosaicTool::new(temp.path()));

    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = orchestrator(temp.path(), &client, &tool)
        .with_cancellation(cancel)
        .run(&[image(42)], true)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert!(summary.sweep.is_none());
    assert_eq!(client.metadata_requests(), 0);
    assert!(tool.jobs().is_empty());
}
