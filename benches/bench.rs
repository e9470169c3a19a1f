//! Criterion benchmarks for Blockpost integer streams.
//!
//! Covers the hot paths of every codec kind:
//! - Sequential writes
//! - Sequential reads
//! - Seeks to serialized marks

use blockpost::codec::config::{CodecConfig, CodecKind};
use blockpost::codec::factory::IntStreamFactory;
use blockpost::codec::index::{BlockPosition, IndexEncoding, IndexEntryWriter};
use blockpost::codec::{IntStreamReader, IntStreamWriter};
use blockpost::storage::Storage;
use blockpost::storage::memory::MemoryStorage;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

const VALUE_COUNT: usize = 100_000;

const KINDS: [CodecKind; 3] = [
    CodecKind::FixedVInt,
    CodecKind::FixedPacked,
    CodecKind::VariableVInt,
];

/// Doc-id-delta-like values: mostly small with a long tail.
fn generate_values(count: usize) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(1);
    (0..count)
        .map(|_| {
            if rng.random_bool(0.05) {
                rng.random_range(0..100_000)
            } else {
                rng.random_range(1..64)
            }
        })
        .collect()
}

fn factory(kind: CodecKind) -> IntStreamFactory {
    IntStreamFactory::new(CodecConfig {
        kind,
        ..Default::default()
    })
    .unwrap()
}

fn write_values(
    factory: &IntStreamFactory,
    storage: &dyn Storage,
    values: &[u32],
) -> Vec<BlockPosition> {
    let mut writer = factory.create_output(storage, "bench.ints").unwrap();
    let mut marks = Vec::with_capacity(values.len());
    for &value in values {
        marks.push(writer.mark().unwrap());
        writer.write(value).unwrap();
    }
    writer.close().unwrap();
    marks
}

fn bench_write(c: &mut Criterion) {
    let values = generate_values(VALUE_COUNT);
    let mut group = c.benchmark_group("write");
    group.throughput(Throughput::Elements(VALUE_COUNT as u64));

    for kind in KINDS {
        let factory = factory(kind);
        group.bench_with_input(BenchmarkId::from_parameter(kind.name()), &values, |b, values| {
            b.iter(|| {
                let storage = MemoryStorage::new_default();
                let mut writer = factory.create_output(&storage, "bench.ints").unwrap();
                for &value in values {
                    writer.write(black_box(value)).unwrap();
                }
                writer.close().unwrap();
                black_box(storage.total_size())
            });
        });
    }
    group.finish();
}

fn bench_sequential_read(c: &mut Criterion) {
    let values = generate_values(VALUE_COUNT);
    let mut group = c.benchmark_group("sequential_read");
    group.throughput(Throughput::Elements(VALUE_COUNT as u64));

    for kind in KINDS {
        let factory = factory(kind);
        let storage = MemoryStorage::new_default();
        write_values(&factory, &storage, &values);

        group.bench_function(kind.name(), |b| {
            let mut buf = vec![0u32; VALUE_COUNT];
            b.iter(|| {
                let mut reader = factory.open_input(&storage, "bench.ints").unwrap();
                black_box(reader.read_into(&mut buf).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_seek(c: &mut Criterion) {
    let values = generate_values(VALUE_COUNT);
    let mut group = c.benchmark_group("seek");

    for kind in KINDS {
        let factory = factory(kind);
        let storage = MemoryStorage::new_default();
        let marks = write_values(&factory, &storage, &values);

        // Round-trip the marks through the relative index encoding once.
        let mut index = Vec::new();
        let mut writer = IndexEntryWriter::new();
        for &mark in marks.iter().step_by(97) {
            writer
                .write_and_promote(&mut index, mark, IndexEncoding::Relative)
                .unwrap();
        }

        let mut reader = factory.open_input(&storage, "bench.ints").unwrap();
        let mut entries = reader.index_reader();
        let mut source = index.as_slice();
        let targets: Vec<BlockPosition> = (0..marks.len().div_ceil(97))
            .map(|_| entries.read(&mut source, IndexEncoding::Relative).unwrap())
            .collect();

        let mut rng = StdRng::seed_from_u64(9);
        let order: Vec<usize> = (0..1024)
            .map(|_| rng.random_range(0..targets.len()))
            .collect();

        group.throughput(Throughput::Elements(order.len() as u64));
        group.bench_function(kind.name(), |b| {
            b.iter(|| {
                let mut sum = 0u64;
                for &i in &order {
                    reader.seek(targets[i]).unwrap();
                    sum += reader.next().unwrap() as u64;
                }
                black_box(sum)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_write, bench_sequential_read, bench_seek);
criterion_main!(benches);
