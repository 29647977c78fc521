use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use serial_frames::framing::{Command, FrameDecoder, DEFAULT_MAGIC_BYTE};
use std::hint::black_box;
use std::time::Duration;

fn wire(frames: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames * 5);
    for i in 0..frames {
        // One byte of noise between frames
        bytes.push(0x00);
        let command = Command::new(i as u8, (i >> 8) as u8, 0x10);
        bytes.extend_from_slice(&command.to_frame(DEFAULT_MAGIC_BYTE));
    }
    bytes
}

pub fn bench_frame_decoding(c: &mut Criterion) {
    let sample = wire(4096);
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(sample.len() as u64));

    group.bench_function("step", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            let mut count = 0usize;
            for &byte in black_box(&sample) {
                if decoder.step(byte).is_some() {
                    count += 1;
                }
            }
            black_box(count)
        })
    });

    group.bench_function("feed_64_byte_chunks", |b| {
        b.iter(|| {
            let mut count = 0usize;
            let mut handler = FrameDecoder::new()
                .on_command(|command| {
                    black_box(command);
                })
                .into_data_handler();
            for chunk in black_box(&sample).chunks(64) {
                handler(chunk);
                count += chunk.len();
            }
            black_box(count)
        })
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_frame_decoding
}
criterion_main!(benches);
