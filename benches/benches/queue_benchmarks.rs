use std::{hint::black_box, sync::Arc};

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use orderhub::OrderedQueue;

/// Вставка 1000 конвертов в свежую очередь, чтобы куча не росла между
/// итерациями.
fn bench_push(c: &mut Criterion) {
    let topic: Arc<str> = Arc::from("chan");
    let mut group = c.benchmark_group("queue_push");
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("fresh_1000", |b| {
        b.iter_batched(
            OrderedQueue::new,
            |q| {
                for i in 0..1_000i64 {
                    black_box(q.push(i % 16, topic.clone(), i));
                }
                q
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_push_pop(c: &mut Criterion) {
    let topic: Arc<str> = Arc::from("chan");
    let mut group = c.benchmark_group("queue_push_pop");
    for size in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let q = OrderedQueue::new();
                for i in 0..size {
                    q.push((i % 7) as i64, topic.clone(), i);
                }
                while let Some(e) = q.try_pop() {
                    q.task_done(e.sequence());
                    black_box(e);
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_push, bench_push_pop);
criterion_main!(benches);
