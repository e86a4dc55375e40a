//! Per-image completion tracking.
//!
//! Each image being downloaded moves through
//!
//! ```text
//! Enumerating ──► Draining ──► Ready
//!      │                         ▲
//!      └──── (nothing to fetch) ─┘
//! ```
//!
//! Tile completions race the enumeration loop: a fetch can finish before the
//! loop has decided about the remaining tiles. Readiness is therefore checked
//! both when enumeration ends and on every completion, under the same lock
//! that mutates the outstanding count, and the Ready transition is latched so
//! it fires exactly once.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::tile::{ImageKey, TileKey};

/// Phase of an image download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    /// Tiles are still being checked and dispatched.
    Enumerating,
    /// Every tile is decided; some fetches are still outstanding.
    Draining,
    /// Every dispatched fetch has finished.
    Ready,
}

#[derive(Debug, Default)]
struct StateInner {
    dispatched: BTreeSet<u32>,
    outstanding: u32,
    done_enumerating: bool,
    ready: bool,
}

impl StateInner {
    /// Latches the Ready transition. Returns `true` only the first time the
    /// image is found ready.
    fn latch_ready(&mut self) -> bool {
        if self.done_enumerating && self.outstanding == 0 && !self.ready {
            self.ready = true;
            return true;
        }
        false
    }
}

/// Download state of one image.
#[derive(Debug)]
pub struct ImageDownloadState {
    image: ImageKey,
    inner: Mutex<StateInner>,
}

impl ImageDownloadState {
    pub fn new(image: ImageKey) -> Self {
        Self {
            image,
            inner: Mutex::new(StateInner::default()),
        }
    }

    pub fn image(&self) -> ImageKey {
        self.image
    }

    /// Records a tile fetch being dispatched.
    pub fn begin_tile(&self, index: u32) {
        let mut inner = self.lock();
        inner.dispatched.insert(index);
        inner.outstanding += 1;
    }

    /// Records a dispatched fetch finishing, successfully or not.
    ///
    /// Returns `true` if this completion made the image ready.
    pub fn tile_finished(&self) -> bool {
        let mut inner = self.lock();
        inner.outstanding = inner.outstanding.saturating_sub(1);
        inner.latch_ready()
    }

    /// Records that every tile has been decided.
    ///
    /// Returns `true` if the image is ready at this point, which is the case
    /// when nothing was dispatched or every fetch already finished.
    pub fn finish_enumeration(&self) -> bool {
        let mut inner = self.lock();
        inner.done_enumerating = true;
        inner.latch_ready()
    }

    pub fn phase(&self) -> DownloadPhase {
        let inner = self.lock();
        if inner.ready {
            DownloadPhase::Ready
        } else if inner.done_enumerating {
            DownloadPhase::Draining
        } else {
            DownloadPhase::Enumerating
        }
    }

    /// Tiles still being fetched.
    pub fn outstanding(&self) -> u32 {
        self.lock().outstanding
    }

    /// Indices of every tile that was dispatched, ascending.
    pub fn dispatched(&self) -> Vec<u32> {
        self.lock().dispatched.iter().copied().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StateInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Tracks every image currently downloading and announces ready ones.
///
/// Ready images are sent on the channel given at construction; a state is
/// dropped from the tracker as soon as it turns ready.
#[derive(Debug, Clone)]
pub struct CompletionTracker {
    states: Arc<DashMap<ImageKey, Arc<ImageDownloadState>>>,
    ready_tx: mpsc::UnboundedSender<ImageKey>,
}

impl CompletionTracker {
    pub fn new(ready_tx: mpsc::UnboundedSender<ImageKey>) -> Self {
        Self {
            states: Arc::new(DashMap::new()),
            ready_tx,
        }
    }

    /// Starts tracking an image entering enumeration.
    pub fn begin_image(&self, image: ImageKey) -> Arc<ImageDownloadState> {
        let state = Arc::new(ImageDownloadState::new(image));
        self.states.insert(image, Arc::clone(&state));
        state
    }

    /// Records a tile fetch being dispatched.
    ///
    /// The returned guard marks the tile finished when dropped, so the
    /// outstanding count is released on success, failure, cancellation or
    /// panic alike.
    pub fn begin_tile(&self, state: &Arc<ImageDownloadState>, tile: TileKey) -> TileCompletion {
        state.begin_tile(tile.index());
        trace!(tile = %tile, "Tile fetch dispatched");
        TileCompletion {
            tracker: self.clone(),
            state: Arc::clone(state),
            tile,
        }
    }

    /// Marks enumeration of an image finished.
    pub fn finish_enumeration(&self, state: &Arc<ImageDownloadState>) {
        if state.finish_enumeration() {
            self.announce(state);
        } else {
            debug!(
                image = %state.image(),
                outstanding = state.outstanding(),
                "Image draining"
            );
        }
    }

    /// Number of images enumerating or draining.
    pub fn active_images(&self) -> usize {
        self.states.len()
    }

    /// Whether an image is still being tracked.
    pub fn is_tracking(&self, image: ImageKey) -> bool {
        self.states.contains_key(&image)
    }

    fn announce(&self, state: &ImageDownloadState) {
        let image = state.image();
        self.states.remove(&image);
        debug!(
            image = %image,
            dispatched = state.dispatched().len(),
            "Image ready to combine"
        );
        if self.ready_tx.send(image).is_err() {
            debug!(image = %image, "Ready event dropped, no dispatcher listening");
        }
    }
}

/// Guard for one dispatched tile fetch.
#[derive(Debug)]
pub struct TileCompletion {
    tracker: CompletionTracker,
    state: Arc<ImageDownloadState>,
    tile: TileKey,
}

impl TileCompletion {
    pub fn tile(&self) -> TileKey {
        self.tile
    }
}

impl Drop for TileCompletion {
    fn drop(&mut self) {
        if self.state.tile_finished() {
            self.tracker.announce(&self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn image(tiles: u8) -> ImageKey {
        let zoom = match tiles {
            0..=4 => 2,
            5..=16 => 3,
            _ => 20,
        };
        ImageKey::new(42, zoom).unwrap()
    }

    fn tracker() -> (CompletionTracker, mpsc::UnboundedReceiver<ImageKey>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CompletionTracker::new(tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ImageKey>) -> Vec<ImageKey> {
        let mut out = Vec::new();
        while let Ok(key) = rx.try_recv() {
            out.push(key);
        }
        out
    }

    #[test]
    fn test_zero_downloads_is_ready_at_end_of_enumeration() {
        let (tracker, mut rx) = tracker();
        let key = image(4);
        let state = tracker.begin_image(key);

        assert_eq!(state.phase(), DownloadPhase::Enumerating);
        tracker.finish_enumeration(&state);

        assert_eq!(state.phase(), DownloadPhase::Ready);
        assert_eq!(drain(&mut rx), vec![key]);
        assert!(!tracker.is_tracking(key));
    }

    #[test]
    fn test_ready_after_last_completion() {
        let (tracker, mut rx) = tracker();
        let key = image(4);
        let state = tracker.begin_image(key);

        let a = tracker.begin_tile(&state, key.tile(0).unwrap());
        let b = tracker.begin_tile(&state, key.tile(3).unwrap());
        tracker.finish_enumeration(&state);
        assert_eq!(state.phase(), DownloadPhase::Draining);
        assert_eq!(state.dispatched(), vec![0, 3]);

        drop(a);
        assert!(drain(&mut rx).is_empty());
        drop(b);

        assert_eq!(drain(&mut rx), vec![key]);
        assert_eq!(tracker.active_images(), 0);
    }

    #[test]
    fn test_completions_before_enumeration_ends_do_not_fire_early() {
        let (tracker, mut rx) = tracker();
        let key = image(4);
        let state = tracker.begin_image(key);

        let a = tracker.begin_tile(&state, key.tile(0).unwrap());
        drop(a);
        assert!(drain(&mut rx).is_empty());

        let b = tracker.begin_tile(&state, key.tile(1).unwrap());
        drop(b);
        assert!(drain(&mut rx).is_empty());

        tracker.finish_enumeration(&state);
        assert_eq!(drain(&mut rx), vec![key]);
    }

    #[test]
    fn test_state_latches_ready_once() {
        let state = ImageDownloadState::new(image(4));
        assert!(state.finish_enumeration());
        assert!(!state.finish_enumeration());
        assert!(!state.tile_finished());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_completions_fire_once() {
        let (tracker, mut rx) = tracker();
        let key = image(192);
        let state = tracker.begin_image(key);
        let mut handles = Vec::new();

        for tile in key.tiles() {
            let completion = tracker.begin_tile(&state, tile);
            let delay = (tile.index() % 7) as u64;
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                drop(completion);
            }));
        }
        tracker.finish_enumeration(&state);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(drain(&mut rx), vec![key]);
    }

    #[tokio::test]
    async fn test_panicking_fetch_still_releases_tile() {
        let (tracker, mut rx) = tracker();
        let key = image(4);
        let state = tracker.begin_image(key);

        let completion = tracker.begin_tile(&state, key.tile(2).unwrap());
        let handle = tokio::spawn(async move {
            let _completion = completion;
            panic!("fetch blew up");
        });
        assert!(handle.await.is_err());

        tracker.finish_enumeration(&state);
        assert_eq!(drain(&mut rx), vec![key]);
    }

    /// One step of a randomized schedule.
    #[derive(Debug, Clone, Copy)]
    enum Step {
        /// Dispatch the next tile.
        Dispatch,
        /// Complete the n-th currently outstanding fetch, if any.
        Complete(usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![Just(Step::Dispatch), (0usize..16).prop_map(Step::Complete)]
    }

    proptest! {
        /// Property: the Ready event fires exactly once for any interleaving
        /// of dispatches, completions and the end of enumeration.
        #[test]
        fn prop_ready_fires_exactly_once(
            steps in prop::collection::vec(step(), 0..64),
            tail_order in prop::collection::vec(0usize..16, 0..32),
        ) {
            let (tracker, mut rx) = tracker();
            let key = image(16);
            let state = tracker.begin_image(key);
            let mut tiles = key.tiles();
            let mut outstanding: Vec<TileCompletion> = Vec::new();

            for step in steps {
                match step {
                    Step::Dispatch => {
                        if let Some(tile) = tiles.next() {
                            outstanding.push(tracker.begin_tile(&state, tile));
                        }
                    }
                    Step::Complete(n) if !outstanding.is_empty() => {
                        let idx = n % outstanding.len();
                        drop(outstanding.swap_remove(idx));
                    }
                    Step::Complete(_) => {}
                }
                prop_assert!(drain(&mut rx).is_empty());
            }

            tracker.finish_enumeration(&state);
            let mut fired = drain(&mut rx).len();

            for n in tail_order {
                if outstanding.is_empty() {
                    break;
                }
                let idx = n % outstanding.len();
                drop(outstanding.swap_remove(idx));
                fired += drain(&mut rx).len();
            }
            outstanding.clear();
            fired += drain(&mut rx).len();

            prop_assert_eq!(fired, 1);
            prop_assert_eq!(state.phase(), DownloadPhase::Ready);
        }
    }
}
