//! Benchmark decode, table build and batch routing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use osc_router::config::MappingConfig;
use osc_router::mapping::{presets, MappingRule, RoutingTable, RuleKind, PropertyTarget};
use osc_router::protocol::{decode_packet, encode_bundle, OscArg, OscMessage, IMMEDIATE};
use osc_router::server::BatchProcessor;

/// Face preset mappings plus the matching inbound batch
fn face_batch(messages: usize) -> (MappingConfig, Vec<OscMessage>) {
    let mut mappings = MappingConfig::default();
    presets::add_face_shape_keys(&mut mappings, "Face");

    let batch = presets::FACE_SHAPE_KEYS
        .iter()
        .cycle()
        .take(messages)
        .enumerate()
        .map(|(i, name)| OscMessage::new(format!("/{name}"), vec![OscArg::Float((i % 100) as f32 / 100.0)]))
        .collect();
    (mappings, batch)
}

fn bench_map_value(c: &mut Criterion) {
    let rule = MappingRule::new("/v", RuleKind::Generic(PropertyTarget::TimelineFrame))
        .with_input(-1.0, 1.0)
        .with_output(0.0, 250.0)
        .with_invert(true);

    c.bench_function("map_value", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for i in 0..1000 {
                acc += rule.map_value(black_box(i as f64 / 500.0 - 1.0));
            }
            acc
        })
    });
}

fn bench_decode(c: &mut Criterion) {
    let (_, batch) = face_batch(32);
    let bundle = encode_bundle(IMMEDIATE, &batch).expect("bundle");

    c.bench_function("decode_bundle_32", |b| {
        b.iter(|| decode_packet(black_box(bundle.as_slice())))
    });
}

fn bench_table_build(c: &mut Criterion) {
    let (mappings, _) = face_batch(0);

    c.bench_function("table_build_face_preset", |b| {
        b.iter(|| RoutingTable::build(black_box(&mappings)))
    });
}

fn bench_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_batch");

    for size in [10usize, 100] {
        let (mappings, batch) = face_batch(size);
        let table = RoutingTable::build(&mappings).expect("table");
        let mut processor = BatchProcessor::default();

        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            b.iter(|| processor.process(&table, black_box(batch)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_map_value, bench_decode, bench_table_build, bench_process);
criterion_main!(benches);
