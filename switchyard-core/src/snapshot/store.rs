//! Lock-free snapshot publication with reader-safe draining.
//!
//! Uses `ArcSwap` to hot-swap the published snapshot without read locks on
//! the routing path. Readers acquire a generation-pinned handle; a reload
//! briefly gates new acquisitions while the previous generation drains, so
//! no request ever observes a mix of two generations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::snapshot::Snapshot;

// Bounded-poll backoff: spin first, then yield, then sleep with the delay
// doubling up to a small cap. Replaces the raw usleep busy-wait of older
// implementations while keeping the worst-case latency bounded.
struct Backoff {
    step: u32,
}

const SPIN_STEPS: u32 = 6;
const YIELD_STEPS: u32 = 10;
const MAX_SLEEP: Duration = Duration::from_millis(1);

impl Backoff {
    fn new() -> Self {
        Self { step: 0 }
    }

    fn wait(&mut self) {
        if self.step < SPIN_STEPS {
            for _ in 0..(1 << self.step) {
                std::hint::spin_loop();
            }
        } else if self.step < YIELD_STEPS {
            std::thread::yield_now();
        } else {
            let exp = (self.step - YIELD_STEPS).min(10);
            let sleep = Duration::from_micros(1 << exp).min(MAX_SLEEP);
            std::thread::sleep(sleep);
        }
        self.step = self.step.saturating_add(1);
    }
}

/// A generation-pinned, reference-counted view of one snapshot.
///
/// All resolution for one request must go through one handle; dropping it
/// releases the reader count, even on early return, which is what lets a
/// pending reload drain.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    inner: Arc<Snapshot>,
}

impl std::ops::Deref for SnapshotHandle {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        &self.inner
    }
}

/// Atomically hot-swappable store of the current configuration snapshot.
#[derive(Debug)]
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
    /// Set for the duration of a reload's drain-and-publish window; new
    /// acquirers poll briefly while it is up.
    reloading: AtomicBool,
    /// Linearizes reloads; a second concurrent reload is rejected.
    reload_lock: Mutex<()>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(Snapshot::empty())
    }
}

impl SnapshotStore {
    /// Create a store publishing the given initial snapshot.
    pub fn new(initial: Snapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            reloading: AtomicBool::new(false),
            reload_lock: Mutex::new(()),
        }
    }

    /// Acquire a handle on the currently published generation.
    ///
    /// This is the only place routing work may stall, and only while an
    /// in-flight reload drains the previous generation.
    pub fn acquire(&self) -> SnapshotHandle {
        let mut backoff = Backoff::new();
        while self.reloading.load(Ordering::Acquire) {
            backoff.wait();
        }
        SnapshotHandle {
            inner: self.current.load_full(),
        }
    }

    /// Generation counter of the currently published snapshot.
    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    /// Publish a fully built and validated snapshot.
    ///
    /// Gates new acquirers, waits for outstanding handles on the previous
    /// generation to drain, then swaps the pointer. Returns
    /// [`ConfigError::ReloadInProgress`] if another reload holds the lock.
    pub fn publish(&self, next: Snapshot) -> Result<(), ConfigError> {
        let _guard = self
            .reload_lock
            .try_lock()
            .map_err(|_| ConfigError::ReloadInProgress)?;

        self.reloading.store(true, Ordering::Release);

        // Drain: one reference is held by the ArcSwap slot and one by us;
        // anything beyond that is an in-flight request handle. The wait is
        // bounded by how quickly those requests finish.
        let previous = self.current.load_full();
        let mut backoff = Backoff::new();
        while Arc::strong_count(&previous) > 2 {
            backoff.wait();
        }

        let generation = next.generation();
        debug!(
            from = previous.generation(),
            to = generation,
            "previous generation drained, publishing"
        );
        self.current.store(Arc::new(next));
        self.reloading.store(false, Ordering::Release);

        info!(generation, "published snapshot");
        Ok(())
    }
}
