//! Download scheduler dispatch loop.
//!
//! Images enter through a [`SchedulerHandle`] and are processed one at a
//! time by [`DownloadScheduler::run`]:
//!
//! 1. wait while the mosaic backlog is at its limit
//! 2. dequeue the next image
//! 3. enumerate its tiles, asking the filesystem probe about each one
//! 4. spawn a fetch for every missing or corrupt tile, bounded by the
//!    global download limiter
//!
//! Enumeration is sequential so tile fetches of one image are issued before
//! those of the next. Fetches complete in any order; the
//! [`CompletionTracker`] announces the image once the last one finishes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::tracker::{CompletionTracker, TileCompletion};
use crate::config::DownloadConfig;
use crate::context::{PipelineContext, PipelineStats};
use crate::limiter::ConcurrencyLimiter;
use crate::provider::{AsyncHttpClient, BirdseyeEndpoints, ProviderError};
use crate::tile::ImageKey;

/// Cloneable entry point for adding images to the download queue.
///
/// Scheduling is idempotent: an image key is accepted at most once per run.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    sender: Mutex<Option<mpsc::UnboundedSender<ImageKey>>>,
    scheduled: Mutex<HashSet<ImageKey>>,
    depth: watch::Sender<usize>,
    stats: Arc<PipelineStats>,
}

impl SchedulerHandle {
    /// Creates a handle and the receiving end of its queue.
    pub(crate) fn channel(stats: Arc<PipelineStats>) -> (Self, mpsc::UnboundedReceiver<ImageKey>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (depth, _) = watch::channel(0);
        let handle = Self {
            inner: Arc::new(HandleInner {
                sender: Mutex::new(Some(tx)),
                scheduled: Mutex::new(HashSet::new()),
                depth,
                stats,
            }),
        };
        (handle, rx)
    }

    /// Queues an image for download.
    ///
    /// Returns `false` if the image was already scheduled this run or the
    /// queue has been closed.
    pub fn schedule_image(&self, image: ImageKey) -> bool {
        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let Some(sender) = sender.as_ref() else {
            debug!(image = %image, "Queue closed, image not scheduled");
            return false;
        };

        let mut scheduled = self
            .inner
            .scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if !scheduled.insert(image) {
            return false;
        }

        self.inner.depth.send_modify(|depth| *depth += 1);
        if sender.send(image).is_err() {
            // The loop is gone; undo so the depth stays truthful
            self.inner.depth.send_modify(|depth| *depth = depth.saturating_sub(1));
            return false;
        }

        self.inner.stats.record_image_scheduled();
        debug!(image_id = image.image_id(), zoom = image.zoom(), "Image scheduled");
        true
    }

    /// Signals that no more images will be added.
    ///
    /// The dispatch loop finishes once the remaining queue is processed.
    pub fn close(&self) {
        let mut sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if sender.take().is_some() {
            debug!("Download queue closed");
        }
    }

    /// Images queued but not yet taken by the dispatch loop.
    pub fn queue_depth(&self) -> usize {
        *self.inner.depth.borrow()
    }

    /// Subscribes to queue depth changes.
    pub fn subscribe_depth(&self) -> watch::Receiver<usize> {
        self.inner.depth.subscribe()
    }

    /// Whether an image has been scheduled this run.
    pub fn is_scheduled(&self, image: ImageKey) -> bool {
        self.inner
            .scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&image)
    }

    /// Records an image taken off the queue.
    pub(crate) fn mark_dequeued(&self) {
        self.inner
            .depth
            .send_modify(|depth| *depth = depth.saturating_sub(1));
    }
}

/// Background loop turning scheduled images into tile fetches.
pub struct DownloadScheduler<C> {
    client: Arc<C>,
    endpoints: Arc<BirdseyeEndpoints>,
    config: DownloadConfig,
    ctx: PipelineContext,
    tracker: CompletionTracker,
    limiter: Arc<ConcurrencyLimiter>,
    handle: SchedulerHandle,
    receiver: mpsc::UnboundedReceiver<ImageKey>,
    stitch_backlog: Option<watch::Receiver<usize>>,
}

impl<C: AsyncHttpClient + 'static> DownloadScheduler<C> {
    /// Creates the scheduler and its handle.
    ///
    /// Images whose downloads have all finished are sent on `ready_tx`.
    pub fn new(
        client: Arc<C>,
        endpoints: Arc<BirdseyeEndpoints>,
        config: DownloadConfig,
        ctx: PipelineContext,
        ready_tx: mpsc::UnboundedSender<ImageKey>,
    ) -> (Self, SchedulerHandle) {
        let (handle, receiver) = SchedulerHandle::channel(Arc::clone(&ctx.stats));
        let scheduler = Self {
            client,
            endpoints,
            config,
            tracker: CompletionTracker::new(ready_tx),
            limiter: Arc::new(ConcurrencyLimiter::new("tiles", config.max_concurrent())),
            ctx,
            handle: handle.clone(),
            receiver,
            stitch_backlog: None,
        };
        (scheduler, handle)
    }

    /// Defers new images while the mosaic queue holds
    /// `max_pending_stitch` or more jobs.
    pub fn with_stitch_backlog(mut self, backlog: watch::Receiver<usize>) -> Self {
        self.stitch_backlog = Some(backlog);
        self
    }

    /// The global tile download limiter.
    pub fn limiter(&self) -> Arc<ConcurrencyLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Runs until the queue is closed and empty, then drains in-flight
    /// fetches. Returns early on cancellation.
    pub async fn run(mut self) {
        let tasks = TaskTracker::new();
        info!(
            max_concurrent = self.limiter.max_concurrent(),
            "Download scheduler started"
        );

        loop {
            if !self.wait_for_stitch_backlog().await {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => None,
                next = self.receiver.recv() => next,
            };
            let Some(image) = next else {
                break;
            };
            self.handle.mark_dequeued();

            self.enumerate(image, &tasks).await;
        }

        self.drain(tasks).await;
        info!(
            peak_in_flight = self.limiter.peak_in_flight(),
            "Download scheduler stopped"
        );
    }

    /// Waits until the mosaic backlog drops below its limit.
    ///
    /// Returns `false` if cancelled while waiting.
    async fn wait_for_stitch_backlog(&mut self) -> bool {
        let max = self.config.max_pending_stitch();
        let Some(backlog) = self.stitch_backlog.as_mut() else {
            return true;
        };
        if max == 0 {
            return true;
        }

        let mut logged = false;
        loop {
            let pending = *backlog.borrow_and_update();
            if pending < max {
                return true;
            }
            if !logged {
                debug!(pending, max, "Mosaic backlog full, deferring downloads");
                logged = true;
            }
            tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => return false,
                changed = backlog.changed() => {
                    if changed.is_err() {
                        // Dispatcher gone, nothing left to wait for
                        return true;
                    }
                }
            }
        }
    }

    async fn enumerate(&self, image: ImageKey, tasks: &TaskTracker) {
        let state = self.tracker.begin_image(image);
        let mut dispatched = 0u32;
        let mut skipped = 0u32;

        for tile in image.tiles() {
            if self.ctx.is_cancelled() {
                break;
            }

            if !self.ctx.probe.tile_needs_download(tile).await {
                self.ctx.stats.record_tile_skipped();
                skipped += 1;
                continue;
            }

            let Some(permit) = self.limiter.acquire(&self.ctx.cancel).await else {
                break;
            };
            let completion = self.tracker.begin_tile(&state, tile);
            let fetch = TileFetch {
                client: Arc::clone(&self.client),
                url: self.endpoints.tile_url(tile),
                ctx: self.ctx.clone(),
                min_tile_bytes: self.config.min_tile_bytes(),
            };
            tasks.spawn(async move {
                let _permit = permit;
                fetch.run(completion).await;
            });
            dispatched += 1;
        }

        debug!(
            image_id = image.image_id(),
            zoom = image.zoom(),
            dispatched,
            skipped,
            "Tile enumeration finished"
        );
        self.tracker.finish_enumeration(&state);
    }

    async fn drain(&self, tasks: TaskTracker) {
        tasks.close();
        if tasks.is_empty() {
            return;
        }

        let start = Instant::now();
        let drain_timeout = self.config.drain_timeout();
        debug!(in_flight = tasks.len(), "Draining tile fetches");
        tokio::select! {
            _ = tasks.wait() => {
                debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Tile fetches drained");
            }
            _ = async {
                self.ctx.cancel.cancelled().await;
                tokio::time::sleep(drain_timeout).await;
            } => {
                warn!(
                    abandoned = tasks.len(),
                    timeout_secs = drain_timeout.as_secs_f64(),
                    "Gave up waiting for tile fetches after cancellation"
                );
            }
        }
    }
}

/// One tile download, from HTTP GET to the file landing on disk.
struct TileFetch<C> {
    client: Arc<C>,
    url: String,
    ctx: PipelineContext,
    min_tile_bytes: u64,
}

impl<C: AsyncHttpClient> TileFetch<C> {
    async fn run(self, completion: TileCompletion) {
        let tile = completion.tile();

        let result = match self.client.get(&self.url).await {
            Ok(body) if (body.len() as u64) < self.min_tile_bytes => {
                Err(ProviderError::InvalidResponse(format!(
                    "{} bytes, below the {} byte minimum",
                    body.len(),
                    self.min_tile_bytes
                )))
            }
            other => other,
        };

        match result {
            Ok(body) => match self.ctx.probe.write_tile(tile, &body).await {
                Ok(()) => self.ctx.stats.record_tile_downloaded(body.len()),
                Err(e) => {
                    self.ctx.stats.record_tile_failed();
                    warn!(tile = %tile, error = %e, "Failed to write tile");
                    self.ctx
                        .reports
                        .record_error(&format!("write tile {}", tile), &e);
                }
            },
            Err(e) => {
                self.ctx.stats.record_tile_failed();
                warn!(tile = %tile, url = %self.url, error = %e, "Tile download failed");
                self.ctx
                    .reports
                    .record_error(&format!("download {}", self.url), &e);
            }
        }

        // Completion is released here, after the tile is on disk
        drop(completion);
    }
}
