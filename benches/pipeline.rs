//! Ingestion benchmarks.
//!
//! Run with: `cargo bench --bench pipeline`
//!
//! - decode: JSON array vs NDJSON payloads
//! - encode: gzip NDJSON batch serialization
//! - engine: full in-memory run over several source objects

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use flate2::Compression;
use serde_json::json;

use telemetry_ingest::deadletter::MemoryDeadLetterSink;
use telemetry_ingest::execution::{IngestionEngine, PipelineOptions};
use telemetry_ingest::ingestion::decode_str;
use telemetry_ingest::processing::{Enricher, Validator};
use telemetry_ingest::storage::{MemoryObjectStore, encode_batch};
use telemetry_ingest::types::Notification;

const RECORDS: usize = 1_000;

fn ndjson(n: usize) -> String {
    (0..n)
        .map(|i| {
            json!({
                "device_id": format!("dev-{}", i % 37),
                "timestamp": "2024-06-01T00:00:00Z",
                "metrics": {"temp": 18.0 + (i % 10) as f64, "co2": 400 + i % 50, "humidity": 40},
                "location": "hall-3"
            })
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn bench_decode(c: &mut Criterion) {
    let lines = ndjson(RECORDS);
    let array = format!("[{}]", lines.replace('\n', ","));

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(RECORDS as u64));
    group.bench_function("json_array", |b| b.iter(|| decode_str(black_box(&array)).unwrap()));
    group.bench_function("ndjson", |b| b.iter(|| decode_str(black_box(&lines)).unwrap()));
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let validator = Validator::default();
    let enricher = Enricher::default();
    let records: Vec<_> = decode_str(&ndjson(RECORDS))
        .unwrap()
        .into_iter()
        .map(|raw| enricher.enrich(&validator.validate(raw).unwrap()).unwrap())
        .collect();

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(RECORDS as u64));
    group.bench_function("gzip_default", |b| {
        b.iter(|| encode_batch(black_box(&records), Compression::default()).unwrap())
    });
    group.bench_function("gzip_fast", |b| {
        b.iter(|| encode_batch(black_box(&records), Compression::fast()).unwrap())
    });
    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let source = Arc::new(MemoryObjectStore::new());
    let payload = ndjson(RECORDS);
    let notifications: Vec<_> = (0..8)
        .map(|i| {
            let key = format!("in/{i}.ndjson");
            source.insert(key.clone(), payload.clone());
            Notification::new("raw", key)
        })
        .collect();

    let mut group = c.benchmark_group("engine");
    group.throughput(Throughput::Elements((RECORDS * notifications.len()) as u64));
    group.sample_size(20);
    group.bench_function("process_8_objects", |b| {
        b.iter(|| {
            // Fresh destination each iteration; batches are write-once.
            let engine = IngestionEngine::new(
                source.clone(),
                Arc::new(MemoryObjectStore::new()),
                Arc::new(MemoryDeadLetterSink::new()),
                PipelineOptions::default(),
            )
            .unwrap();
            engine.process(black_box(&notifications))
        })
    });
    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode, bench_engine);
criterion_main!(benches);
