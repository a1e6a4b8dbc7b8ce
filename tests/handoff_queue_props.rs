//! Property tests for the handoff queue

use bytes::Bytes;
use proptest::prelude::*;
use std::collections::VecDeque;
use std::time::Duration;

use udp_audio_streamer::audio::{handoff_queue, SampleBlock};
use udp_audio_streamer::error::QueueError;

#[derive(Debug, Clone)]
enum Op {
    Enqueue,
    Dequeue,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Enqueue), Just(Op::Dequeue)]
}

fn block(sequence: u64) -> SampleBlock {
    SampleBlock::new(Bytes::from(sequence.to_le_bytes().to_vec()), sequence)
}

proptest! {
    /// Length never exceeds capacity, and the queue behaves like a bounded
    /// FIFO that rejects (drops) the newest block when full
    #[test]
    fn matches_bounded_fifo_model(capacity in 1usize..32, ops in prop::collection::vec(op(), 0..256)) {
        let (producer, consumer) = handoff_queue(capacity);
        let mut model: VecDeque<u64> = VecDeque::new();
        let mut next = 0u64;

        for op in ops {
            match op {
                Op::Enqueue => {
                    let result = producer.enqueue(block(next), Duration::ZERO);
                    if model.len() < capacity {
                        prop_assert!(result.is_ok());
                        model.push_back(next);
                    } else {
                        prop_assert_eq!(result, Err(QueueError::Full));
                    }
                    next += 1;
                }
                Op::Dequeue => {
                    let got = consumer.try_dequeue().unwrap().map(|b| b.sequence());
                    prop_assert_eq!(got, model.pop_front());
                }
            }
            prop_assert!(consumer.len() <= capacity);
            prop_assert_eq!(consumer.len(), model.len());
        }
    }

    /// Dequeued blocks come out in enqueue order with their payload intact
    #[test]
    fn dequeue_preserves_order_and_payload(capacity in 1usize..16, count in 0usize..64) {
        let (producer, consumer) = handoff_queue(capacity);
        let mut accepted = Vec::new();

        for seq in 0..count as u64 {
            if producer.enqueue(block(seq), Duration::ZERO).is_ok() {
                accepted.push(seq);
            }
        }
        drop(producer);

        let mut seen = Vec::new();
        while let Ok(Some(b)) = consumer.try_dequeue() {
            prop_assert_eq!(b.data(), &b.sequence().to_le_bytes()[..]);
            seen.push(b.sequence());
        }

        prop_assert_eq!(seen, accepted);
        prop_assert_eq!(consumer.try_dequeue(), Err(QueueError::Closed));
    }
}
