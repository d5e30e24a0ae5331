use std::{hint::black_box, sync::Arc};

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use orderhub::{Callback, Hub};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn bench_subscribe(c: &mut Criterion) {
    let hub: Hub<Bytes> = Hub::new();
    c.bench_function("hub_subscribe", |b| {
        b.iter(|| {
            black_box(hub.subscribe("chan", Callback::infallible(|_: &Bytes| {})));
        })
    });
}

/// Публикация 1000 сообщений в незапущенный хаб. Каждая пачка получает
/// новый хаб, поэтому очередь не накапливается.
fn bench_publish_queued(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub_publish_queued");
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("fresh_1000", |b| {
        b.iter_batched(
            Hub::<Bytes>::new,
            |hub| {
                for _ in 0..1_000 {
                    black_box(hub.publish("chan", Bytes::from_static(b"x")));
                }
                hub
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

/// Публикация пачки сообщений и ожидание их доставки через `join`.
fn bench_publish_join(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("hub_publish_join");

    for subscribers in [0usize, 1, 10] {
        let hub: Arc<Hub<Bytes>> = Arc::new(Hub::new());
        for _ in 0..subscribers {
            hub.subscribe(
                "chan",
                Callback::infallible(|p: &Bytes| {
                    black_box(p.len());
                }),
            );
        }
        rt.block_on(async { hub.start() }).unwrap();

        group.throughput(Throughput::Elements(1_000));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                b.to_async(&rt).iter(|| async {
                    for i in 0..1_000i64 {
                        hub.publish_with_priority("chan", Bytes::from_static(b"payload"), i % 4);
                    }
                    hub.join().await.unwrap();
                })
            },
        );

        rt.block_on(hub.stop());
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_subscribe,
    bench_publish_queued,
    bench_publish_join
);
criterion_main!(benches);
