//! Mosaic dispatcher.
//!
//! Ready events from the download scheduler and the end-of-run sweep both
//! end up in [`MosaicDispatcher::check_image`], which re-judges the image
//! from disk before queuing a [`StitchJob`]. A pool of workers drains the
//! queue through a [`MosaicTool`].
//!
//! An image key stays in the active set from the moment its job is queued
//! until the tool run finishes, so the same mosaic is never queued twice
//! concurrently.

use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::job::StitchJob;
use super::tool::MosaicTool;
use crate::context::PipelineContext;
use crate::probe::Completeness;
use crate::tile::ImageKey;

/// What [`MosaicDispatcher::check_image`] decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The zoom level is never stitched.
    Unsupported,
    /// The image directory does not exist.
    NotPresent,
    /// Tiles are missing; the directory was reported.
    Incomplete,
    /// The mosaic is newer than every tile.
    UpToDate,
    /// A stitch job was queued.
    Queued,
    /// A job for this image is already queued or running.
    AlreadyQueued,
    /// The directory could not be read.
    ScanFailed,
    /// The stitch queue was already closed.
    QueueClosed,
}

/// Totals of one reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub images_checked: u64,
    pub queued: u64,
    pub incomplete: u64,
    pub up_to_date: u64,
}

/// Verifies ready images and feeds stitch jobs to the worker pool.
pub struct MosaicDispatcher {
    ctx: PipelineContext,
    sender: Mutex<Option<mpsc::UnboundedSender<StitchJob>>>,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<StitchJob>>>,
    active: Mutex<HashSet<ImageKey>>,
    pending: watch::Sender<usize>,
}

impl MosaicDispatcher {
    pub fn new(ctx: PipelineContext) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0);
        Arc::new(Self {
            ctx,
            sender: Mutex::new(Some(tx)),
            receiver: Arc::new(tokio::sync::Mutex::new(rx)),
            active: Mutex::new(HashSet::new()),
            pending,
        })
    }

    /// Jobs queued and not yet picked up by a worker.
    pub fn stitch_pending(&self) -> watch::Receiver<usize> {
        self.pending.subscribe()
    }

    /// Current number of queued jobs.
    pub fn pending_jobs(&self) -> usize {
        *self.pending.borrow()
    }

    /// Judges an image from disk and queues a stitch job if it needs one.
    pub async fn check_image(&self, image: ImageKey) -> DispatchOutcome {
        if image.grid_dimension().is_none() {
            return DispatchOutcome::Unsupported;
        }

        let probe = self.ctx.probe.clone();
        let judged = tokio::task::spawn_blocking(move || probe.completeness(image)).await;
        let completeness = match judged {
            Ok(Ok(completeness)) => completeness,
            Ok(Err(e)) => {
                warn!(image = %image, error = %e, "Failed to scan image directory");
                self.ctx
                    .reports
                    .record_error(&format!("scan {}", image), &e);
                return DispatchOutcome::ScanFailed;
            }
            Err(e) => {
                warn!(image = %image, error = %e, "Directory scan task failed");
                return DispatchOutcome::ScanFailed;
            }
        };

        match completeness {
            Completeness::MissingDirectory => DispatchOutcome::NotPresent,
            Completeness::Incomplete { found, expected } => {
                let dir = self.ctx.layout().image_dir(image);
                if self.ctx.reports.record_missing_tiles(&dir) {
                    self.ctx.stats.record_image_incomplete();
                    info!(
                        image_id = image.image_id(),
                        zoom = image.zoom(),
                        found,
                        expected,
                        "Image incomplete"
                    );
                }
                DispatchOutcome::Incomplete
            }
            Completeness::UpToDate => DispatchOutcome::UpToDate,
            Completeness::NeedsStitch => self.enqueue(image),
        }
    }

    fn enqueue(&self, image: ImageKey) -> DispatchOutcome {
        let Some(job) = StitchJob::for_image(image) else {
            return DispatchOutcome::Unsupported;
        };

        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.contains(&image) {
            return DispatchOutcome::AlreadyQueued;
        }

        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = sender.as_ref() else {
            debug!(image = %image, "Stitch queue closed, job dropped");
            return DispatchOutcome::QueueClosed;
        };

        self.pending.send_modify(|pending| *pending += 1);
        if sender.send(job).is_err() {
            self.pending
                .send_modify(|pending| *pending = pending.saturating_sub(1));
            return DispatchOutcome::QueueClosed;
        }
        active.insert(image);
        self.ctx.stats.record_stitch_queued();
        debug!(image_id = image.image_id(), zoom = image.zoom(), "Stitch job queued");
        DispatchOutcome::Queued
    }

    /// Re-checks every image directory under every zoom level.
    ///
    /// Idempotent: an up-to-date dataset queues nothing.
    pub async fn reconcile(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();
        let probe = self.ctx.probe.clone();

        let listing = probe.clone();
        let zooms = match blocking(move || listing.zoom_levels()).await {
            Ok(zooms) => zooms,
            Err(e) => {
                warn!(error = %e, "Failed to list zoom directories");
                self.ctx.reports.record_error("reconcile", &e);
                return summary;
            }
        };

        for zoom in zooms {
            let listing = probe.clone();
            let ids = match blocking(move || listing.image_ids(zoom)).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(zoom, error = %e, "Failed to list image directories");
                    self.ctx
                        .reports
                        .record_error(&format!("reconcile zoom {}", zoom), &e);
                    continue;
                }
            };

            for id in ids {
                if self.ctx.is_cancelled() {
                    return summary;
                }
                let Ok(image) = ImageKey::new(id, zoom) else {
                    continue;
                };
                summary.images_checked += 1;
                match self.check_image(image).await {
                    DispatchOutcome::Queued => summary.queued += 1,
                    DispatchOutcome::Incomplete => summary.incomplete += 1,
                    DispatchOutcome::UpToDate => summary.up_to_date += 1,
                    _ => {}
                }
            }
        }

        info!(
            checked = summary.images_checked,
            queued = summary.queued,
            incomplete = summary.incomplete,
            up_to_date = summary.up_to_date,
            "Reconciliation sweep finished"
        );
        summary
    }

    /// Signals that no more jobs will be queued.
    ///
    /// Workers exit once the remaining jobs are done.
    pub fn close_queue(&self) {
        if self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
        {
            debug!("Stitch queue closed");
        }
    }

    /// Starts `workers` tasks running queued jobs through `tool`.
    pub fn spawn_workers<T: MosaicTool>(
        self: &Arc<Self>,
        tool: Arc<T>,
        workers: usize,
    ) -> Vec<JoinHandle<()>> {
        (0..workers.max(1))
            .map(|worker| {
                let dispatcher = Arc::clone(self);
                let tool = Arc::clone(&tool);
                tokio::spawn(async move { dispatcher.worker_loop(worker, tool).await })
            })
            .collect()
    }

    async fn worker_loop<T: MosaicTool>(&self, worker: usize, tool: Arc<T>) {
        debug!(worker, "Mosaic worker started");
        loop {
            let next = tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => None,
                job = async { self.receiver.lock().await.recv().await } => job,
            };
            let Some(job) = next else {
                break;
            };
            self.pending
                .send_modify(|pending| *pending = pending.saturating_sub(1));

            self.run_job(tool.as_ref(), &job).await;

            self.active
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&job.image());
        }
        debug!(worker, "Mosaic worker stopped");
    }

    async fn run_job<T: MosaicTool>(&self, tool: &T, job: &StitchJob) {
        let image = job.image();

        // Tiles may have changed while the job was queued
        let probe = self.ctx.probe.clone();
        let still_needed = tokio::task::spawn_blocking(move || probe.completeness(image))
            .await
            .map(|result| matches!(result, Ok(Completeness::NeedsStitch)))
            .unwrap_or(false);
        if !still_needed {
            debug!(job = %job, "Stitch no longer needed");
            return;
        }

        match tool.combine(job).await {
            Ok(()) => {
                self.ctx.stats.record_stitch_result(true);
                info!(image_id = image.image_id(), zoom = image.zoom(), "Mosaic combined");
            }
            Err(e) => {
                self.ctx.stats.record_stitch_result(false);
                warn!(job = %job, error = %e, "Mosaic tool failed");
                self.ctx
                    .reports
                    .record_error(&format!("stitch {}", job), &e);
            }
        }
    }
}

/// Runs a directory listing on the blocking pool.
async fn blocking<T, F>(list: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(list)
        .await
        .unwrap_or_else(|e| Err(io::Error::other(e.to_string())))
}

impl std::fmt::Debug for MosaicDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MosaicDispatcher")
            .field("pending", &self.pending_jobs())
            .finish()
    }
}
