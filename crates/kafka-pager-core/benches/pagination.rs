//! Performance benchmarks for page computation.
//!
//! Measures slot allocation over many partitions, gap filling, and a full
//! topic page against the in-memory log.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use kafka_pager_core::model::{Offset, PageSize, Partition, Record};
use kafka_pager_core::pager::gap_filler;
use kafka_pager_core::pager::{PagerSettings, SlotAllocator, TopicPager};
use kafka_pager_core::testing::MemoryLog;

/// Partition counts with a long tail, like a topic keyed by a skewed id.
fn skewed_counts(partitions: i32) -> Vec<(Partition, u64)> {
    (0..partitions)
        .map(|p| (Partition(p), 1_000_000 / (u64::from(p.unsigned_abs()) + 1)))
        .collect()
}

fn bench_slot_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot_allocation");
    let allocator = SlotAllocator::new(PageSize::DEFAULT);

    for partitions in [4, 64, 1024] {
        let counts = skewed_counts(partitions);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("first_page", partitions),
            &counts,
            |b, counts| {
                b.iter(|| black_box(allocator.allocate(counts, 1)));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("deep_page", partitions),
            &counts,
            |b, counts| {
                b.iter(|| black_box(allocator.allocate(counts, 10_000)));
            },
        );
    }

    group.finish();
}

fn bench_gap_filling(c: &mut Criterion) {
    let mut group = c.benchmark_group("gap_filling");

    for gap_every in [2, 10, 1_000] {
        let fetched: Vec<Record> = (0..25i64 * gap_every)
            .filter(|o| o % gap_every != 0)
            .take(25)
            .map(|o| Record::new(Partition(0), Offset(o), "payload"))
            .collect();

        group.throughput(Throughput::Elements(25));
        group.bench_with_input(
            BenchmarkId::new("gap_every", gap_every),
            &fetched,
            |b, fetched| {
                b.iter(|| {
                    black_box(gap_filler::fill(
                        fetched.clone(),
                        Partition(0),
                        Offset(0),
                        25,
                        Offset(1_000_000),
                    ))
                });
            },
        );
    }

    group.finish();
}

fn bench_topic_page(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let log = Arc::new(MemoryLog::new());
    runtime.block_on(async {
        log.create_topic("bench", 16).await;
        for p in 0..16 {
            log.append_n("bench", Partition(p), 2_000).await;
        }
    });
    let pager = TopicPager::new(log.clone(), PagerSettings::default());
    let partitions: Vec<Partition> = (0..16).map(Partition).collect();

    let mut group = c.benchmark_group("topic_page");
    group.throughput(Throughput::Elements(25));
    group.bench_function("sixteen_partitions", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(pager.topic_page("bench", &partitions, 50).await.unwrap())
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_slot_allocation,
    bench_gap_filling,
    bench_topic_page,
);

criterion_main!(benches);
