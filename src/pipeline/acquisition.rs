//! Acquisition loop: source → handoff queue
//!
//! Reads one block per iteration with an unbounded wait and queues it. A read
//! failure is fatal for the channel: it is disabled, released and the loop
//! ends. A full queue only costs the newest block.

use bytes::BytesMut;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::audio::{AcquisitionSource, BlockProducer, SampleBlock};
use crate::error::{AcquisitionError, QueueError};
use crate::pipeline::stats::PipelineStats;

pub struct AcquisitionLoop {
    source: Box<dyn AcquisitionSource>,
    producer: BlockProducer,
    block_size: usize,
    enqueue_wait: Duration,
    stats: Arc<PipelineStats>,
}

impl AcquisitionLoop {
    pub fn new(
        source: Box<dyn AcquisitionSource>,
        producer: BlockProducer,
        block_size: usize,
        enqueue_wait: Duration,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            source,
            producer,
            block_size,
            enqueue_wait,
            stats,
        }
    }

    /// Run until the channel fails or the transmission side is gone
    ///
    /// Returns `Ok(())` when nothing can consume blocks anymore and the read
    /// error otherwise. The channel is disabled and released either way.
    pub fn run(self) -> Result<(), AcquisitionError> {
        let AcquisitionLoop {
            mut source,
            producer,
            block_size,
            enqueue_wait,
            stats,
        } = self;

        if let Err(e) = source.enable() {
            tracing::error!("Failed to enable acquisition channel: {}", e);
            source.release();
            return Err(e);
        }
        tracing::info!("Acquisition channel enabled: {}", source.name());

        let mut sequence: u64 = 0;
        // Blocks dropped since the queue last accepted one
        let mut drop_streak: u64 = 0;

        let outcome = loop {
            // Fresh buffer per block; the previous one now belongs to the queue
            let mut buf = BytesMut::zeroed(block_size);
            match source.read(&mut buf, None) {
                Ok(n) if n == block_size => {}
                Ok(n) => {
                    break Err(AcquisitionError::ShortRead {
                        expected: block_size,
                        actual: n,
                    })
                }
                Err(e) => break Err(e),
            }

            let block = SampleBlock::new(buf.freeze(), sequence);
            sequence = sequence.wrapping_add(1);

            // Captured only once the block is queued or counted as dropped
            match producer.enqueue(block, enqueue_wait) {
                Ok(()) => {
                    stats.record_captured();
                    if drop_streak > 0 {
                        tracing::info!("Handoff queue accepting again after {} dropped blocks", drop_streak);
                        drop_streak = 0;
                    }
                }
                Err(QueueError::Full) => {
                    stats.record_captured();
                    stats.record_dropped();
                    if drop_streak == 0 {
                        tracing::warn!("Handoff queue full, dropping newest blocks");
                    }
                    drop_streak += 1;
                }
                Err(QueueError::Closed) => break Ok(()),
            }

            thread::yield_now();
        };

        match &outcome {
            Ok(()) => tracing::warn!("Transmission has ended, stopping acquisition"),
            Err(e) => tracing::error!("Acquisition read failed: {}", e),
        }

        if let Err(e) = source.disable() {
            tracing::warn!("Failed to disable acquisition channel: {}", e);
        }
        source.release();
        tracing::info!("Acquisition channel released after {} blocks", sequence);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::handoff_queue;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Yields `blocks` reads then fails; records lifecycle calls
    struct CountingSource {
        blocks: usize,
        short: bool,
        enabled: Arc<AtomicBool>,
        released: Arc<AtomicBool>,
    }

    impl AcquisitionSource for CountingSource {
        fn enable(&mut self) -> Result<(), AcquisitionError> {
            self.enabled.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8], _wait: Option<Duration>) -> Result<usize, AcquisitionError> {
            if self.blocks == 0 {
                return Err(AcquisitionError::ReadFailed("driver fault".into()));
            }
            self.blocks -= 1;
            buf.fill(self.blocks as u8);
            if self.short {
                return Ok(buf.len() / 2);
            }
            Ok(buf.len())
        }

        fn disable(&mut self) -> Result<(), AcquisitionError> {
            self.enabled.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn release(self: Box<Self>) {
            self.released.store(true, Ordering::SeqCst);
        }

        fn name(&self) -> String {
            "counting".into()
        }
    }

    fn source(blocks: usize, short: bool) -> (CountingSource, Arc<AtomicBool>, Arc<AtomicBool>) {
        let enabled = Arc::new(AtomicBool::new(false));
        let released = Arc::new(AtomicBool::new(false));
        (
            CountingSource {
                blocks,
                short,
                enabled: enabled.clone(),
                released: released.clone(),
            },
            enabled,
            released,
        )
    }

    #[test]
    fn test_read_failure_tears_down_channel() {
        let (src, enabled, released) = source(2, false);
        let (producer, consumer) = handoff_queue(4);
        let stats = Arc::new(PipelineStats::new());

        let result = AcquisitionLoop::new(Box::new(src), producer, 32, Duration::ZERO, stats.clone()).run();

        assert!(matches!(result, Err(AcquisitionError::ReadFailed(_))));
        assert!(!enabled.load(Ordering::SeqCst));
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(stats.snapshot().blocks_captured, 2);
        assert_eq!(consumer.len(), 2);
    }

    #[test]
    fn test_full_queue_drops_and_continues() {
        let (src, _, _) = source(5, false);
        let (producer, consumer) = handoff_queue(2);
        let stats = Arc::new(PipelineStats::new());

        let _ = AcquisitionLoop::new(Box::new(src), producer, 16, Duration::ZERO, stats.clone()).run();

        let snap = stats.snapshot();
        assert_eq!(snap.blocks_captured, 5);
        assert_eq!(snap.blocks_dropped, 3);
        // The two oldest survive intact
        assert_eq!(consumer.try_dequeue().unwrap().unwrap().data(), &[4u8; 16]);
        assert_eq!(consumer.try_dequeue().unwrap().unwrap().data(), &[3u8; 16]);
    }

    #[test]
    fn test_short_read_is_fatal() {
        let (src, _, released) = source(3, true);
        let (producer, consumer) = handoff_queue(4);
        let stats = Arc::new(PipelineStats::new());

        let result = AcquisitionLoop::new(Box::new(src), producer, 32, Duration::ZERO, stats).run();

        assert!(matches!(
            result,
            Err(AcquisitionError::ShortRead { expected: 32, actual: 16 })
        ));
        assert!(released.load(Ordering::SeqCst));
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_consumer_gone_stops_cleanly() {
        let (src, enabled, released) = source(10, false);
        let (producer, consumer) = handoff_queue(4);
        drop(consumer);

        let stats = Arc::new(PipelineStats::new());
        let result = AcquisitionLoop::new(Box::new(src), producer, 8, Duration::ZERO, stats.clone()).run();

        assert!(result.is_ok());
        assert!(!enabled.load(Ordering::SeqCst));
        assert!(released.load(Ordering::SeqCst));
        // The block read after transmission ended went nowhere and is not counted
        let snap = stats.snapshot();
        assert_eq!(snap.blocks_captured, 0);
        assert_eq!(snap.blocks_dropped, 0);
    }
}
