//! Request concurrency limiter.
//!
//! A semaphore-based limiter that caps how many requests of one kind are in
//! flight at once. The pipeline keeps two of them: one bounding tile
//! downloads and one bounding metadata requests.
//!
//! Permits are owned, so they can move into spawned fetch tasks and are
//! released when the task finishes, however it finishes.
//!
//! ```ignore
//! use std::sync::Arc;
//! use birdseye::limiter::ConcurrencyLimiter;
//!
//! let limiter = Arc::new(ConcurrencyLimiter::new("tiles", 100));
//! let Some(permit) = limiter.acquire(&cancel).await else { return };
//! tokio::spawn(async move {
//!     let _permit = permit;
//!     // HTTP request happens here
//! });
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Limiter for request concurrency.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    /// Label used in logs
    name: &'static str,

    /// Semaphore controlling concurrent requests
    semaphore: Arc<Semaphore>,

    /// Maximum permits
    max_permits: usize,

    /// Current number of in-flight requests
    in_flight: Arc<AtomicUsize>,

    /// Peak concurrent requests observed
    peak_in_flight: AtomicUsize,
}

impl ConcurrencyLimiter {
    /// Creates a new limiter with the specified maximum concurrent requests.
    ///
    /// A limit of zero is raised to one so the pipeline can always progress.
    pub fn new(name: &'static str, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            name,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_permits: max_concurrent,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Acquires a permit, waiting until one is available.
    ///
    /// Returns `None` if `cancel` fires first or the limiter was closed.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<LimiterPermit> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            permit = self.semaphore.clone().acquire_owned() => permit.ok()?,
        };
        Some(self.track(permit))
    }

    /// Tries to acquire a permit without waiting.
    pub fn try_acquire(&self) -> Option<LimiterPermit> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        Some(self.track(permit))
    }

    fn track(&self, permit: OwnedSemaphorePermit) -> LimiterPermit {
        let current = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;

        let mut peak = self.peak_in_flight.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }

        LimiterPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Label of this limiter.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the maximum number of concurrent requests allowed.
    pub fn max_concurrent(&self) -> usize {
        self.max_permits
    }

    /// Returns the current number of in-flight requests.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Returns the peak number of concurrent requests observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    /// Returns the number of available permits.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// A permit for one in-flight request, released on drop.
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
