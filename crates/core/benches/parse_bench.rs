//! Parser and pipeline throughput benchmarks for inwatch-core

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use inwatch_core::record::encode_record;
use inwatch_core::{
    parse_next, EventBuffer, EventMask, EventPipeline, EventSource, FillOutcome, Registry,
    WatcherConfig,
};
use std::io;
use std::path::Path;
use std::sync::Mutex;

/// Source that hands every watch descriptor 1 and serves one prepared burst
struct BurstSource {
    burst: Mutex<Option<Vec<u8>>>,
}

impl BurstSource {
    fn new(burst: Vec<u8>) -> Self {
        Self {
            burst: Mutex::new(Some(burst)),
        }
    }
}

impl EventSource for BurstSource {
    fn add_watch(&self, _path: &Path, _mask: u32) -> io::Result<u32> {
        Ok(1)
    }

    fn rm_watch(&self, _wd: u32) -> io::Result<()> {
        Ok(())
    }

    fn read_events(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self.burst.lock().unwrap().take() {
            Some(bytes) if bytes.len() <= buf.len() => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(bytes.len())
            }
            Some(_) => Err(io::ErrorKind::InvalidInput.into()),
            None => Err(io::ErrorKind::WouldBlock.into()),
        }
    }
}

fn burst(records: usize, name_len: usize) -> Vec<u8> {
    let name = vec![b'f'; name_len];
    let mut bytes = Vec::new();
    for _ in 0..records {
        bytes.extend(encode_record(1, EventMask::MODIFY.bits(), 0, &name));
    }
    bytes
}

fn bench_parse_next(c: &mut Criterion) {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = BurstSource::new(Vec::new());
    let mut registry = Registry::new();
    registry
        .register(&source, temp_dir.path(), EventMask::INTEREST)
        .unwrap();

    let mut group = c.benchmark_group("parse_next");

    for (label, name_len) in [("short_names", 8), ("long_names", 200)] {
        let bytes = burst(64, name_len);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_function(label, |b| {
            let mut buffer = EventBuffer::new(bytes.len(), 95);
            b.iter(|| {
                buffer.append(&bytes);
                while let Some(parsed) = parse_next(&mut buffer, &mut registry).unwrap() {
                    black_box(parsed);
                }
            });
        });
    }

    group.finish();
}

fn bench_pipeline_fill_and_drain(c: &mut Criterion) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = WatcherConfig::default();
    // 48-byte records; the burst has to fit one read or it is deferred
    let records = 150;
    let bytes = burst(records, 16);
    assert!(bytes.len() <= config.buffer_capacity());

    c.bench_function("pipeline_fill_and_drain", |b| {
        b.iter_batched(
            || {
                let source = BurstSource::new(bytes.clone());
                let mut pipeline = EventPipeline::new(&config);
                pipeline
                    .register(&source, temp_dir.path(), EventMask::INTEREST)
                    .unwrap();
                (source, pipeline)
            },
            |(source, mut pipeline)| {
                assert!(matches!(
                    pipeline.fill_from(&source).unwrap(),
                    FillOutcome::Read(_)
                ));
                let mut drained = 0;
                while let Some(event) = pipeline.next_event(Some(&source)).unwrap() {
                    black_box(event);
                    drained += 1;
                }
                assert_eq!(drained, records);
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_parse_next, bench_pipeline_fill_and_drain);
criterion_main!(benches);
