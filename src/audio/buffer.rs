//! Bounded handoff queue for sample blocks
//!
//! Single-producer single-consumer FIFO between the acquisition and
//! transmission threads. Blocks are owned buffers moved through the queue.
//! When the queue is full the NEWEST block is dropped so acquisition keeps
//! its cadence.

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::QueueError;

/// One capture interval of raw samples, sent as exactly one datagram
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleBlock {
    /// Raw interleaved samples in the source's native encoding
    data: Bytes,
    /// Capture index, local only (never put on the wire)
    sequence: u64,
}

impl SampleBlock {
    pub fn new(data: Bytes, sequence: u64) -> Self {
        Self { data, sequence }
    }

    /// Get the raw payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the capture index
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Create a handoff queue holding at most `capacity` blocks
///
/// # Panics
///
/// Panics if `capacity` is 0.
pub fn handoff_queue(capacity: usize) -> (BlockProducer, BlockConsumer) {
    assert!(capacity > 0, "Capacity must be non-zero");

    let (tx, rx) = bounded(capacity);
    let producer_alive = Arc::new(AtomicBool::new(true));
    (
        BlockProducer {
            tx,
            capacity,
            producer_alive: producer_alive.clone(),
        },
        BlockConsumer {
            rx,
            capacity,
            producer_alive,
        },
    )
}

/// Producer end; owned by the acquisition loop
pub struct BlockProducer {
    tx: Sender<SampleBlock>,
    capacity: usize,
    /// Cleared on drop so the consumer can see the producer is gone
    producer_alive: Arc<AtomicBool>,
}

impl BlockProducer {
    /// Queue a block, waiting at most `wait` for a free slot
    ///
    /// A zero budget never blocks. On `QueueError::Full` the block has been
    /// dropped and the queued entries are untouched.
    pub fn enqueue(&self, block: SampleBlock, wait: Duration) -> Result<(), QueueError> {
        if wait.is_zero() {
            return match self.tx.try_send(block) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => Err(QueueError::Full),
                Err(TrySendError::Disconnected(_)) => Err(QueueError::Closed),
            };
        }

        match self.tx.send_timeout(block, wait) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(QueueError::Full),
            Err(SendTimeoutError::Disconnected(_)) => Err(QueueError::Closed),
        }
    }

    /// Get number of queued blocks
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Check if queue is full
    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }

    /// Get queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for BlockProducer {
    fn drop(&mut self) {
        self.producer_alive.store(false, Ordering::Release);
    }
}

/// Consumer end; owned by the transmission loop
pub struct BlockConsumer {
    rx: Receiver<SampleBlock>,
    capacity: usize,
    producer_alive: Arc<AtomicBool>,
}

impl BlockConsumer {
    /// Take the oldest block without blocking
    ///
    /// `Ok(None)` means empty. `Err(QueueError::Closed)` is only returned once
    /// the producer is gone and every queued block has been taken.
    pub fn try_dequeue(&self) -> Result<Option<SampleBlock>, QueueError> {
        match self.rx.try_recv() {
            Ok(block) => Ok(Some(block)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(QueueError::Closed),
        }
    }

    /// True once the producer is gone and no block is left to take
    ///
    /// Unlike `try_dequeue` this never consumes a block.
    pub fn is_closed(&self) -> bool {
        !self.producer_alive.load(Ordering::Acquire) && self.rx.is_empty()
    }

    /// Get number of queued blocks
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Get queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Relates queue capacity to the producer's block rate
#[derive(Debug, Clone, Copy)]
pub struct QueueSizing {
    pub capacity: usize,
    pub block_period: Duration,
}

impl QueueSizing {
    pub fn new(capacity: usize, block_period: Duration) -> Self {
        Self {
            capacity,
            block_period,
        }
    }

    /// How long the consumer may stall before the producer starts dropping
    pub fn headroom(&self) -> Duration {
        self.block_period.saturating_mul(self.capacity as u32)
    }

    /// Smallest capacity that absorbs a consumer stall of `stall`
    pub fn required_capacity(&self, stall: Duration) -> usize {
        if self.block_period.is_zero() {
            return usize::MAX;
        }
        let period = self.block_period.as_nanos();
        stall.as_nanos().div_ceil(period).max(1) as usize
    }

    pub fn absorbs(&self, stall: Duration) -> bool {
        self.headroom() >= stall
    }
}
