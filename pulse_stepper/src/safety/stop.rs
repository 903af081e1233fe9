//! Quick-stop signalling.
//!
//! A quick-stop is one monotonic word: the sequence number below which every
//! block must be discarded. Raising it is a single atomic store, safe from any
//! context. The tick context compares it against the last cutoff it handled
//! before touching any pulse output.

use crate::context::Shared;
use crate::lifecycle::TickSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct StopSignal {
    cutoff: AtomicU64,
}

impl StopSignal {
    pub const fn new() -> Self {
        Self {
            cutoff: AtomicU64::new(0),
        }
    }

    /// Discard every block with a sequence number below `cutoff`.
    #[inline]
    pub(crate) fn request(&self, cutoff: u64) {
        self.cutoff.fetch_max(cutoff, Ordering::AcqRel);
    }

    #[inline]
    pub fn cutoff(&self) -> u64 {
        self.cutoff.load(Ordering::Acquire)
    }
}

/// Raise a quick-stop from any context (signal handler, watchdog, another
/// thread). Cloneable and lock-free.
#[derive(Clone)]
pub struct QuickStopHandle {
    shared: Arc<Shared>,
    tick_source: Arc<dyn TickSource>,
}

impl QuickStopHandle {
    pub(crate) fn new(shared: Arc<Shared>, tick_source: Arc<dyn TickSource>) -> Self {
        Self {
            shared,
            tick_source,
        }
    }

    /// Abort all queued and executing motion. Takes effect on the next tick.
    pub fn trigger(&self) {
        let cutoff = self.shared.queue.next_seq();
        self.shared.stop.request(cutoff);
        self.shared.faults.record_quick_stop();
        // the tick context performs the discard
        self.tick_source.arm();
    }
}

impl std::fmt::Debug for QuickStopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuickStopHandle")
            .field("cutoff", &self.shared.stop.cutoff())
            .finish()
    }
}
