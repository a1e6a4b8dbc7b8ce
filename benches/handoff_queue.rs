//! Handoff queue throughput between two threads

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::thread;
use std::time::Duration;

use udp_audio_streamer::audio::{handoff_queue, SampleBlock};
use udp_audio_streamer::constants::{DEFAULT_BLOCK_SIZE, DEFAULT_QUEUE_CAPACITY};

const BLOCKS: u64 = 10_000;

fn spsc_handoff(c: &mut Criterion) {
    let payload = Bytes::from(vec![0u8; DEFAULT_BLOCK_SIZE]);

    let mut group = c.benchmark_group("handoff_queue");
    group.throughput(Throughput::Bytes(BLOCKS * DEFAULT_BLOCK_SIZE as u64));

    group.bench_function("spsc_4096_byte_blocks", |b| {
        b.iter(|| {
            let (producer, consumer) = handoff_queue(DEFAULT_QUEUE_CAPACITY);
            let payload = payload.clone();

            let producer = thread::spawn(move || {
                for seq in 0..BLOCKS {
                    let block = SampleBlock::new(payload.clone(), seq);
                    // Wait for room so every block is counted
                    let _ = producer.enqueue(block, Duration::from_secs(1));
                }
            });

            let mut received = 0u64;
            while received < BLOCKS {
                match consumer.try_dequeue() {
                    Ok(Some(block)) => {
                        black_box(block.len());
                        received += 1;
                    }
                    Ok(None) => thread::yield_now(),
                    Err(_) => break,
                }
            }
            let _ = producer.join();
        });
    });

    group.bench_function("block_allocation", |b| {
        b.iter(|| {
            let mut buf = bytes::BytesMut::zeroed(DEFAULT_BLOCK_SIZE);
            buf[0] = 1;
            black_box(SampleBlock::new(buf.freeze(), 0))
        });
    });

    group.finish();
}

criterion_group!(benches, spsc_handoff);
criterion_main!(benches);
