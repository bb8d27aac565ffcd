use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use domain::{AggregateFactory, AggregateRoot, CustomerId, Order, Sku};
use event_store::{EventStore, InMemoryEventStore, Version};

fn order_with_lines(id: &str, lines: usize) -> AggregateRoot<Order> {
    let mut order = AggregateRoot::<Order>::create(id, CustomerId::new()).unwrap();
    for n in 0..lines {
        order.add_line(Sku::new(format!("sku-{n}")), 1).unwrap();
    }
    order
}

fn bench_emit(c: &mut Criterion) {
    c.bench_function("domain/emit_100_lines", |b| {
        b.iter(|| order_with_lines("bench", 100));
    });
}

fn bench_replay(c: &mut Criterion) {
    let history = order_with_lines("bench", 1_000).uncommitted_events().to_vec();

    c.bench_function("domain/replay_1000_events", |b| {
        b.iter_batched(
            || history.clone(),
            |history| AggregateRoot::<Order>::rehydrate("bench", history).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

fn bench_load_from_store(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let order = order_with_lines("bench", 100);
    rt.block_on(async {
        store
            .save(order.uncommitted_envelopes().unwrap(), Version::initial())
            .await
            .unwrap();
    });
    let factory = AggregateFactory::new(store);
    let id = order.id().clone();

    c.bench_function("domain/factory_create_101_events", |b| {
        b.iter(|| {
            rt.block_on(async { factory.create::<Order>(&id).await.unwrap().unwrap() });
        });
    });
}

criterion_group!(benches, bench_emit, bench_replay, bench_load_from_store);
criterion_main!(benches);
