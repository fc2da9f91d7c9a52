//! Bounded, non-blocking queues between the bridge task and the control loop.
//!
//! Both ends are polled: `push` never blocks the producer and `pop` returns
//! immediately when empty. Overflow is counted and logged, never fatal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel as xch;

use crate::command::Command;
use crate::snapshot::OutputSnapshot;

/// Default queue depth shared by both directions.
pub const DEFAULT_CAPACITY: usize = 50;

/// What to drop when a push finds the queue full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Reject the incoming entry.
    DropNewest,
    /// Evict the oldest queued entry to make room (last-write-wins).
    DropOldest,
}

pub struct BoundedQueue<T> {
    name: &'static str,
    tx: xch::Sender<T>,
    rx: xch::Receiver<T>,
    capacity: usize,
    overflow: Overflow,
    dropped: Arc<AtomicU64>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            capacity: self.capacity,
            overflow: self.overflow,
            dropped: self.dropped.clone(),
        }
    }
}

impl<T> core::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("name", &self.name)
            .field("len", &self.rx.len())
            .field("capacity", &self.capacity)
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl<T> BoundedQueue<T> {
    pub fn new(name: &'static str, capacity: usize, overflow: Overflow) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = xch::bounded(capacity);
        Self {
            name,
            tx,
            rx,
            capacity,
            overflow,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Non-blocking push. Returns whether `item` was enqueued.
    pub fn push(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(xch::TrySendError::Full(item)) => match self.overflow {
                Overflow::DropNewest => {
                    let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        queue = self.name,
                        capacity = self.capacity,
                        dropped = total,
                        "queue full, entry dropped"
                    );
                    false
                }
                Overflow::DropOldest => {
                    // Another consumer may have drained in between; either way there is room now
                    // unless a concurrent producer refilled it.
                    let _ = self.rx.try_recv();
                    let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        queue = self.name,
                        capacity = self.capacity,
                        dropped = total,
                        "queue full, oldest entry evicted"
                    );
                    self.tx.try_send(item).is_ok()
                }
            },
            // Unreachable while this handle holds a receiver.
            Err(xch::TrySendError::Disconnected(_)) => false,
        }
    }

    /// Non-blocking pop of the oldest entry.
    pub fn pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued and keep only the newest entry.
    pub fn pop_latest(&self) -> Option<T> {
        let mut latest = None;
        let mut stale = 0usize;
        while let Ok(v) = self.rx.try_recv() {
            if latest.replace(v).is_some() {
                stale += 1;
            }
        }
        if stale > 0 {
            tracing::trace!(queue = self.name, stale, "discarded superseded entries");
        }
        latest
    }

    /// Discard everything queued; returns how many entries were removed.
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries lost to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Bridge -> control loop command FIFO with an out-of-band emergency latch.
///
/// `Emergency` never occupies a FIFO slot: it sets a latch the control loop
/// checks before draining, so it is applied even when the FIFO is saturated.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    fifo: BoundedQueue<Command>,
    emergency: Arc<AtomicBool>,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            fifo: BoundedQueue::new("command", capacity, Overflow::DropNewest),
            emergency: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn push(&self, cmd: Command) -> bool {
        if matches!(cmd, Command::Emergency) {
            self.emergency.store(true, Ordering::SeqCst);
            tracing::error!("emergency latched");
            return true;
        }
        self.fifo.push(cmd)
    }

    /// Consume the emergency latch.
    pub fn take_emergency(&self) -> bool {
        self.emergency.swap(false, Ordering::SeqCst)
    }

    pub fn pop(&self) -> Option<Command> {
        self.fifo.pop()
    }

    pub fn clear(&self) -> usize {
        self.fifo.clear()
    }

    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty() && !self.emergency.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> u64 {
        self.fifo.dropped()
    }
}

/// Control loop -> bridge snapshot queue; keeps the newest entries on overflow.
pub type SnapshotQueue = BoundedQueue<OutputSnapshot>;

pub fn snapshot_queue(capacity: usize) -> SnapshotQueue {
    BoundedQueue::new("snapshot", capacity, Overflow::DropOldest)
}
