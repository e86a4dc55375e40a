//! Run orchestration.
//!
//! A run goes through three phases:
//!
//! 1. start the mosaic workers, the ready-event forwarder and the download
//!    scheduler
//! 2. seed the scheduler with explicit images, then crawl metadata until the
//!    grid is exhausted or the run is cancelled
//! 3. close the download queue, wait for downloads to drain, sweep every
//!    zoom directory once, close the stitch queue and join the workers
//!
//! Cancellation is cooperative: the token stops every loop at its next
//! check, in-flight downloads get a grace period, and the sweep is skipped.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use birdseye::orchestrator::Orchestrator;
//! use birdseye::mosaic::ExternalMosaicTool;
//! use birdseye::provider::AsyncReqwestClient;
//!
//! let config = ConfigFile::load()?;
//! let layout = config.layout();
//! let tool = ExternalMosaicTool::new(&config.mosaic.tool, layout.root());
//! let orchestrator = Orchestrator::new(layout, Arc::new(AsyncReqwestClient::new()?), Arc::new(tool))
//!     .with_endpoints(config.endpoints())
//!     .with_crawl_config(config.crawl_config());
//! let summary = orchestrator.run(&[], true).await?;
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CrawlConfig, DownloadConfig, MosaicConfig};
use crate::context::{PipelineContext, PipelineStatsSnapshot};
use crate::crawler::MetadataCrawler;
use crate::error::PipelineError;
use crate::layout::DatasetLayout;
use crate::mosaic::{MosaicDispatcher, MosaicTool, SweepSummary};
use crate::probe::FilesystemProbe;
use crate::provider::{AsyncHttpClient, BirdseyeEndpoints};
use crate::reports::RunReports;
use crate::scheduler::DownloadScheduler;
use crate::tile::ImageKey;

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Final statistics.
    pub stats: PipelineStatsSnapshot,
    /// Result of the closing sweep; `None` if it was skipped.
    pub sweep: Option<SweepSummary>,
    /// Whether the run was cancelled.
    pub cancelled: bool,
}

/// Wires crawler, scheduler and mosaic dispatcher together for one run.
pub struct Orchestrator<C, T> {
    layout: DatasetLayout,
    client: Arc<C>,
    tool: Arc<T>,
    endpoints: BirdseyeEndpoints,
    crawl: CrawlConfig,
    download: DownloadConfig,
    mosaic: MosaicConfig,
    cancel: CancellationToken,
}

impl<C, T> Orchestrator<C, T>
where
    C: AsyncHttpClient + 'static,
    T: MosaicTool,
{
    /// Creates an orchestrator with default configuration.
    pub fn new(layout: DatasetLayout, client: Arc<C>, tool: Arc<T>) -> Self {
        Self {
            layout,
            client,
            tool,
            endpoints: BirdseyeEndpoints::default(),
            crawl: CrawlConfig::default(),
            download: DownloadConfig::default(),
            mosaic: MosaicConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: BirdseyeEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_crawl_config(mut self, config: CrawlConfig) -> Self {
        self.crawl = config;
        self
    }

    pub fn with_download_config(mut self, config: DownloadConfig) -> Self {
        self.download = config;
        self
    }

    pub fn with_mosaic_config(mut self, config: MosaicConfig) -> Self {
        self.mosaic = config;
        self
    }

    /// Uses an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels the run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Runs the full pipeline.
    ///
    /// `seeds` are scheduled before the crawl starts; with `crawl` false
    /// they are the only images downloaded and no metadata is requested.
    pub async fn run(&self, seeds: &[ImageKey], crawl: bool) -> Result<RunSummary, PipelineError> {
        let ctx = self.start(crawl)?;
        info!(
            root = %self.layout.root().display(),
            seeds = seeds.len(),
            crawl,
            "Run started"
        );

        // Phase 1: consumers first, so no event is produced without a listener
        let dispatcher = MosaicDispatcher::new(ctx.clone());
        let workers = dispatcher.spawn_workers(Arc::clone(&self.tool), self.mosaic.workers());

        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_ready(
            Arc::clone(&dispatcher),
            ready_rx,
            ctx.cancel.clone(),
        ));

        let endpoints = Arc::new(self.endpoints.clone());
        let (scheduler, handle) = DownloadScheduler::new(
            Arc::clone(&self.client),
            Arc::clone(&endpoints),
            self.download,
            ctx.clone(),
            ready_tx,
        );
        let scheduler = tokio::spawn(
            scheduler
                .with_stitch_backlog(dispatcher.stitch_pending())
                .run(),
        );

        // Phase 2
        for &seed in seeds {
            handle.schedule_image(seed);
        }
        if crawl {
            MetadataCrawler::new(
                Arc::clone(&self.client),
                endpoints,
                self.crawl,
                ctx.clone(),
                handle.clone(),
            )
            .run()
            .await;
        }

        // Phase 3
        handle.close();
        join("download scheduler", scheduler).await;
        join("ready forwarder", forwarder).await;

        let sweep = if ctx.is_cancelled() {
            info!("Run cancelled, skipping reconciliation sweep");
            None
        } else {
            Some(dispatcher.reconcile().await)
        };

        Ok(self.finish(&ctx, &dispatcher, workers, sweep).await)
    }

    /// Sweeps the dataset and stitches whatever is due, without any network
    /// activity.
    pub async fn reconcile_only(&self) -> Result<RunSummary, PipelineError> {
        let ctx = self.start(false)?;
        info!(root = %self.layout.root().display(), "Reconciliation started");

        let dispatcher = MosaicDispatcher::new(ctx.clone());
        let workers = dispatcher.spawn_workers(Arc::clone(&self.tool), self.mosaic.workers());
        let sweep = dispatcher.reconcile().await;

        Ok(self.finish(&ctx, &dispatcher, workers, Some(sweep)).await)
    }

    fn start(&self, crawl: bool) -> Result<PipelineContext, PipelineError> {
        self.layout
            .prepare()
            .map_err(|source| PipelineError::Prepare {
                path: self.layout.root().to_path_buf(),
                source,
            })?;

        let reports = if crawl {
            RunReports::open(&self.layout)?
        } else {
            RunReports::open_sweep_only(&self.layout)?
        };
        let probe = FilesystemProbe::new(self.layout.clone(), self.download.min_tile_bytes());
        Ok(PipelineContext::new(probe, reports, self.cancel.clone()))
    }

    async fn finish(
        &self,
        ctx: &PipelineContext,
        dispatcher: &MosaicDispatcher,
        workers: Vec<JoinHandle<()>>,
        sweep: Option<SweepSummary>,
    ) -> RunSummary {
        dispatcher.close_queue();
        for worker in workers {
            join("mosaic worker", worker).await;
        }

        let stats = ctx.stats.snapshot();
        let cancelled = ctx.is_cancelled();
        info!(cancelled, "Run finished: {}", stats);
        RunSummary {
            stats,
            sweep,
            cancelled,
        }
    }
}

/// Hands every ready image to the dispatcher until the scheduler is done.
async fn forward_ready(
    dispatcher: Arc<MosaicDispatcher>,
    mut ready: mpsc::UnboundedReceiver<ImageKey>,
    cancel: CancellationToken,
) {
    loop {
        let image = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            image = ready.recv() => match image {
                Some(image) => image,
                None => break,
            },
        };
        let outcome = dispatcher.check_image(image).await;
        debug!(image = %image, ?outcome, "Ready image checked");
    }
}

async fn join(name: &str, task: JoinHandle<()>) {
    if let Err(e) = task.await {
        warn!(task = name, error = %e, "Pipeline task ended abnormally");
    }
}
