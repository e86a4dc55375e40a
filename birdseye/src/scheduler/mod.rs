//! Download scheduling.
//!
//! [`DownloadScheduler`] turns scheduled images into bounded tile fetches;
//! [`CompletionTracker`] decides, exactly once per image, when the last of
//! those fetches has finished.

mod dispatch;
mod tracker;

pub use dispatch::{DownloadScheduler, SchedulerHandle};
pub use tracker::{CompletionTracker, DownloadPhase, ImageDownloadState, TileCompletion};
