//! Throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use linebridge_core::core::protocol::{decode_line, frame_command};
use linebridge_core::{LineReader, ScriptedChannel};

fn reader_benchmark(c: &mut Criterion) {
    let line = "Motor 3 position 12345 speed 678 torque 90";
    let lines = 256;

    let mut group = c.benchmark_group("reader");
    group.throughput(Throughput::Bytes(((line.len() + 1) * lines) as u64));

    group.bench_function("read_line_burst", |b| {
        b.iter_batched(
            || {
                let (channel, handle) = ScriptedChannel::new();
                for _ in 0..lines {
                    handle.push_line(line);
                }
                (channel, handle, LineReader::new())
            },
            |(mut channel, _handle, mut reader)| {
                let mut count = 0;
                while let Ok(line) = reader.read_line(&mut channel) {
                    if line.is_empty() {
                        break;
                    }
                    count += 1;
                }
                black_box(count)
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("decode_line", |b| {
        let raw = format!("{line}\r");
        b.iter(|| black_box(decode_line(black_box(raw.as_bytes()))))
    });

    group.finish();
}

fn writer_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("writer");

    group.bench_function("frame_command", |b| {
        b.iter(|| black_box(frame_command(black_box("D,250\r\r"))))
    });

    group.finish();
}

criterion_group!(benches, reader_benchmark, writer_benchmark);
criterion_main!(benches);
