//! Metadata crawler.
//!
//! Walks the spiral grid, asks the metadata service about every cell and
//! heading, and hands newly discovered images to the download scheduler.
//! Each response is recorded in the metadata index whether or not it could
//! be used.

use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use super::metadata::MetadataRecord;
use super::spiral::GridCell;
use crate::config::CrawlConfig;
use crate::context::PipelineContext;
use crate::limiter::ConcurrencyLimiter;
use crate::provider::{AsyncHttpClient, BirdseyeEndpoints};
use crate::scheduler::SchedulerHandle;
use crate::tile::{ImageKey, DEFAULT_ZOOM};

/// Crawls birdseye metadata over a bounding box.
pub struct MetadataCrawler<C> {
    client: Arc<C>,
    endpoints: Arc<BirdseyeEndpoints>,
    config: CrawlConfig,
    ctx: PipelineContext,
    scheduler: SchedulerHandle,
    limiter: Arc<ConcurrencyLimiter>,
    seen: Arc<Mutex<HashSet<u64>>>,
}

impl<C> Clone for MetadataCrawler<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            endpoints: Arc::clone(&self.endpoints),
            config: self.config,
            ctx: self.ctx.clone(),
            scheduler: self.scheduler.clone(),
            limiter: Arc::clone(&self.limiter),
            seen: Arc::clone(&self.seen),
        }
    }
}

impl<C: AsyncHttpClient + 'static> MetadataCrawler<C> {
    pub fn new(
        client: Arc<C>,
        endpoints: Arc<BirdseyeEndpoints>,
        config: CrawlConfig,
        ctx: PipelineContext,
        scheduler: SchedulerHandle,
    ) -> Self {
        let limiter = Arc::new(ConcurrencyLimiter::new(
            "metadata",
            config.max_metadata_in_flight(),
        ));
        Self {
            client,
            endpoints,
            config,
            ctx,
            scheduler,
            limiter,
            seen: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// The metadata request limiter.
    pub fn limiter(&self) -> Arc<ConcurrencyLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Number of distinct images discovered so far.
    pub fn discovered(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Crawls every cell of the grid, then waits for outstanding requests.
    ///
    /// Stops issuing requests as soon as cancellation is requested.
    pub async fn run(&self) {
        let grid = self.config.grid();
        let start = Instant::now();
        info!(
            points = grid.remaining(),
            step_lat = self.config.step_lat(),
            step_lon = self.config.step_lon(),
            "Metadata crawl started"
        );

        let tasks = TaskTracker::new();
        let mut depth = self.scheduler.subscribe_depth();
        let mut issued = 0u64;

        for cell in grid.cells() {
            if !self.wait_for_scheduler(&mut depth).await {
                break;
            }
            let Some(permit) = self.limiter.acquire(&self.ctx.cancel).await else {
                break;
            };

            self.ctx.stats.record_metadata_request();
            issued += 1;
            let crawler = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                crawler.process_cell(cell).await;
            });
        }

        tasks.close();
        tokio::select! {
            _ = tasks.wait() => {}
            _ = async {
                self.ctx.cancel.cancelled().await;
                tokio::time::sleep(self.config.drain_timeout()).await;
            } => {
                warn!(abandoned = tasks.len(), "Gave up waiting for metadata requests");
            }
        }

        info!(
            requests = issued,
            discovered = self.discovered(),
            elapsed_secs = start.elapsed().as_secs(),
            "Metadata crawl finished"
        );
    }

    /// Backs off while the scheduler holds more queued images than allowed.
    ///
    /// Returns `false` if cancelled while waiting.
    async fn wait_for_scheduler(&self, depth: &mut watch::Receiver<usize>) -> bool {
        let max = self.config.max_pending_images();
        if max == 0 {
            return !self.ctx.is_cancelled();
        }
        loop {
            if self.ctx.is_cancelled() {
                return false;
            }
            if *depth.borrow_and_update() <= max {
                return true;
            }
            tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => return false,
                changed = depth.changed() => {
                    if changed.is_err() {
                        return true;
                    }
                }
            }
        }
    }

    /// Queries one cell and heading.
    async fn process_cell(&self, cell: GridCell) {
        let url = self.endpoints.metadata_url(&cell);
        trace!(coords = %cell.coords(), heading = cell.heading, "Metadata request");

        let image_id = match self.fetch_record(&url).await {
            Ok((record, body)) => {
                self.handle_record(&record, &body);
                record.image_id
            }
            Err(message) => {
                self.ctx.stats.record_metadata_failure();
                debug!(
                    coords = %cell.coords(),
                    heading = cell.heading,
                    error = %message,
                    "Metadata request unusable"
                );
                self.ctx
                    .reports
                    .record_error(&format!("metadata {}", cell.coords()), &message);
                0
            }
        };

        self.ctx.reports.record_metadata(image_id, &cell);
    }

    async fn fetch_record(&self, url: &str) -> Result<(MetadataRecord, Vec<u8>), String> {
        let body = self.client.get(url).await.map_err(|e| e.to_string())?;
        let record = MetadataRecord::parse(&body).map_err(|e| e.to_string())?;
        Ok((record, body))
    }

    /// Persists and schedules an image the first time it is seen.
    fn handle_record(&self, record: &MetadataRecord, body: &[u8]) {
        let first_sighting = self
            .seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.image_id);
        if !first_sighting {
            return;
        }

        self.ctx.stats.record_image_discovered();
        debug!(
            image_id = record.image_id,
            lat = record.lat,
            lon = record.lon,
            "Image discovered"
        );

        let json_path = self.ctx.layout().metadata_json_path(record.image_id);
        if let Err(e) = save_if_absent(&json_path, body) {
            warn!(path = %json_path.display(), error = %e, "Failed to save metadata document");
            self.ctx
                .reports
                .record_error(&format!("save {}", json_path.display()), &e);
        }
        self.ctx.reports.record_geolocation(record);

        match ImageKey::new(record.image_id, DEFAULT_ZOOM) {
            Ok(image) => {
                self.scheduler.schedule_image(image);
            }
            Err(e) => warn!(image_id = record.image_id, error = %e, "Image not schedulable"),
        }
    }
}

/// Writes `data` to `path` unless the file already exists.
fn save_if_absent(path: &std::path::Path, data: &[u8]) -> io::Result<()> {
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(mut file) => file.write_all(data),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{sample_document, BoundingBox};
    use crate::layout::DatasetLayout;
    use crate::probe::FilesystemProbe;
    use crate::provider::{ProviderError, ScriptedHttpClient};
    use crate::reports::RunReports;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn context(temp: &TempDir) -> PipelineContext {
        let layout = DatasetLayout::new(temp.path());
        layout.prepare().unwrap();
        let reports = RunReports::open(&layout).unwrap();
        PipelineContext::new(
            FilesystemProbe::new(layout, 100),
            reports,
            CancellationToken::new(),
        )
    }

    fn endpoints() -> Arc<BirdseyeEndpoints> {
        Arc::new(
            BirdseyeEndpoints::default()
                .with_metadata_host("http://meta.test")
                .with_api_key("k"),
        )
    }

    /// A single grid point at (-41.0002, 174.0002): 8 headings.
    fn single_point() -> CrawlConfig {
        CrawlConfig::new(BoundingBox::new(-41.0, 174.0, -41.0004, 174.0004))
            .with_steps(0.001, 0.001)
    }

    fn crawler(
        client: ScriptedHttpClient,
        ctx: &PipelineContext,
        config: CrawlConfig,
    ) -> (MetadataCrawler<ScriptedHttpClient>, SchedulerHandle, mpsc::UnboundedReceiver<ImageKey>) {
        let (handle, rx) = SchedulerHandle::channel(Arc::clone(&ctx.stats));
        let crawler = MetadataCrawler::new(
            Arc::new(client),
            endpoints(),
            config,
            ctx.clone(),
            handle.clone(),
        );
        (crawler, handle, rx)
    }

    #[tokio::test]
    async fn test_two_headings_same_image_scheduled_once() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let client = ScriptedHttpClient::new()
            .route("dir=0&", Ok(sample_document(123456).into_bytes()))
            .route("dir=45&", Ok(sample_document(123456).into_bytes()));
        let (crawler, _handle, mut rx) = crawler(client, &ctx, single_point());

        crawler.run().await;

        assert_eq!(rx.try_recv().unwrap(), ImageKey::new(123456, 20).unwrap());
        assert!(rx.try_recv().is_err());
        assert_eq!(crawler.discovered(), 1);

        let snapshot = ctx.stats.snapshot();
        assert_eq!(snapshot.metadata_requests, 8);
        assert_eq!(snapshot.metadata_failures, 6);
        assert_eq!(snapshot.images_discovered, 1);
    }

    #[tokio::test]
    async fn test_index_has_a_row_per_response() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let client = ScriptedHttpClient::new()
            .route("dir=90&", Ok(sample_document(777).into_bytes()))
            .route("dir=180&", Ok(b"{not json".to_vec()));
        let (crawler, _handle, _rx) = crawler(client, &ctx, single_point());

        crawler.run().await;

        let index = std::fs::read_to_string(ctx.layout().metadata_index_path()).unwrap();
        let rows: Vec<_> = index.lines().collect();
        assert_eq!(rows.len(), 8);
        assert!(rows.contains(&"777,90,-41.000200,174.000200"));
        assert!(rows.contains(&"0,180,-41.000200,174.000200"));
        assert_eq!(rows.iter().filter(|r| r.starts_with("0,")).count(), 7);
    }

    #[tokio::test]
    async fn test_metadata_json_saved_once() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let path = ctx.layout().metadata_json_path(555);
        std::fs::write(&path, b"previous").unwrap();

        let client = ScriptedHttpClient::new().route("dir=0&", Ok(sample_document(555).into_bytes()));
        let (crawler, _handle, _rx) = crawler(client, &ctx, single_point());
        crawler.run().await;

        assert_eq!(std::fs::read(&path).unwrap(), b"previous");

        let geo = std::fs::read_to_string(ctx.layout().geolocation_log_path()).unwrap();
        assert!(geo.lines().any(|l| l.starts_with("555.jpg,")));
    }

    #[tokio::test]
    async fn test_requests_cover_every_heading() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let client = ScriptedHttpClient::new();
        let (crawler, _handle, _rx) = crawler(client.clone(), &ctx, single_point());

        crawler.run().await;

        assert_eq!(client.call_count(), 8);
        for heading in crate::crawler::HEADINGS {
            assert_eq!(client.requests_matching(&format!("dir={}&", heading)), 1);
        }
    }

    #[tokio::test]
    async fn test_backs_off_while_scheduler_is_full() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let client = ScriptedHttpClient::new()
            .route("dir=0&", Ok(sample_document(1).into_bytes()))
            .route("dir=45&", Ok(sample_document(2).into_bytes()));
        let config = single_point()
            .with_max_pending_images(1)
            .with_max_metadata_in_flight(1);
        let (crawler, handle, mut rx) = crawler(client.clone(), &ctx, config);

        let task = tokio::spawn({
            let crawler = crawler.clone();
            async move { crawler.run().await }
        });

        // Two images queued, nothing dequeues: the crawl stalls above the limit
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(client.call_count() < 8);

        // Draining the queue lets it finish
        let mut received = 0;
        while received < 2 {
            if rx.recv().await.is_some() {
                received += 1;
                handle.mark_dequeued();
            }
        }
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(client.call_count(), 8);
    }

    #[tokio::test]
    async fn test_cancellation_stops_issuing_requests() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let client = ScriptedHttpClient::new();
        let config = CrawlConfig::new(BoundingBox::new(-41.0, 174.0, -40.0, 175.0))
            .with_steps(0.001, 0.001);
        let (crawler, _handle, _rx) = crawler(client.clone(), &ctx, config);

        ctx.cancel.cancel();
        crawler.run().await;

        assert_eq!(client.call_count(), 0);
    }

    /// Never answers.
    struct StalledClient;

    impl AsyncHttpClient for StalledClient {
        async fn get(&self, _url: &str) -> Result<Vec<u8>, ProviderError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancelled_crawl_waits_only_for_drain_timeout() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let (handle, _rx) = SchedulerHandle::channel(Arc::clone(&ctx.stats));
        let config = single_point().with_drain_timeout(Duration::from_millis(100));
        let crawler = MetadataCrawler::new(
            Arc::new(StalledClient),
            endpoints(),
            config,
            ctx.clone(),
            handle,
        );

        let task = tokio::spawn(async move { crawler.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("crawl should give up on stalled requests after the drain timeout")
            .unwrap();
        assert_eq!(ctx.stats.snapshot().metadata_requests, 8);
    }

    #[tokio::test]
    async fn test_provider_error_logged() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let client = ScriptedHttpClient::new()
            .route("dir=0&", Err(ProviderError::HttpError("HTTP 503".into())));
        let (crawler, _handle, _rx) = crawler(client, &ctx, single_point());

        crawler.run().await;

        let errors = std::fs::read_to_string(ctx.layout().errors_log_path()).unwrap();
        assert!(errors.contains("HTTP 503"));
    }
}
