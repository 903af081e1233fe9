//! Block Source: the FIFO handing admitted blocks to the tick context.
//!
//! The producer enqueues, the tick context dequeues at block boundaries.
//! Each block is stamped with a monotonic sequence number so a quick-stop can
//! name "everything enqueued before now" with a single word.

use heapless::mpmc::MpMcQueue;
use pulse_common::block::Block;
use pulse_common::consts::BLOCK_BUFFER_SIZE;
use static_assertions::const_assert;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

// MpMcQueue capacity must be a power of two.
const_assert!(BLOCK_BUFFER_SIZE.is_power_of_two());

/// A block with its enqueue sequence number.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Queued {
    pub seq: u64,
    pub block: Block,
}

pub struct BlockQueue {
    queue: MpMcQueue<Queued, BLOCK_BUFFER_SIZE>,
    next_seq: AtomicU64,
    /// Queued blocks plus the one executing.
    pending: AtomicU32,
}

impl BlockQueue {
    pub const CAPACITY: usize = BLOCK_BUFFER_SIZE;

    pub const fn new() -> Self {
        Self {
            queue: MpMcQueue::new(),
            next_seq: AtomicU64::new(0),
            pending: AtomicU32::new(0),
        }
    }

    /// Enqueue at the tail. Returns the block back when full.
    ///
    /// Single producer: sequence numbers follow enqueue order.
    pub(crate) fn push(&self, block: Block) -> Result<u64, Block> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        let seq = self.next_seq.fetch_add(1, Ordering::AcqRel);
        match self.queue.enqueue(Queued { seq, block }) {
            Ok(()) => Ok(seq),
            Err(rejected) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                Err(rejected.block)
            }
        }
    }

    #[inline]
    pub(crate) fn pop(&self) -> Option<Queued> {
        self.queue.dequeue()
    }

    /// A block left the engine (finished or discarded).
    #[inline]
    pub(crate) fn retire(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// Sequence number the next enqueued block will get.
    #[inline]
    pub fn next_seq(&self) -> u64 {
        self.next_seq.load(Ordering::Acquire)
    }

    /// Blocks queued or executing.
    #[inline]
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_drained(&self) -> bool {
        self.pending() == 0
    }

    /// Discard queued blocks with `seq < cutoff`.
    ///
    /// FIFO order means every such block sits in front of any newer one, so
    /// the first newer block ends the drain and is handed back to the caller.
    /// Bounded by the queue capacity.
    pub(crate) fn discard_before(&self, cutoff: u64) -> (u32, Option<Queued>) {
        let mut dropped = 0;
        for _ in 0..Self::CAPACITY {
            match self.queue.dequeue() {
                Some(entry) if entry.seq < cutoff => {
                    self.retire();
                    dropped += 1;
                }
                other => return (dropped, other),
            }
        }
        (dropped, None)
    }
}

impl Default for BlockQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BlockQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockQueue")
            .field("next_seq", &self.next_seq())
            .field("pending", &self.pending())
            .finish()
    }
}
