use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use lazy_context::{FlatValue, KeyedStore, LazyBinding};

fn wide_value(keys: usize) -> FlatValue<usize> {
    (0..keys)
        .map(|i| (format!("key{i}"), std::sync::Arc::new(i)))
        .collect()
}

fn store_get_benchmark(c: &mut Criterion) {
    let store = KeyedStore::new(wide_value(16));

    c.bench_function("store_get", |b| {
        b.iter(|| {
            black_box(store.get(black_box("key7")));
        });
    });
}

fn binding_read_benchmark(c: &mut Criterion) {
    let store = KeyedStore::new(wide_value(16));
    let binding = LazyBinding::new(store, || {});
    binding.read("key7");

    c.bench_function("binding_read_tracked", |b| {
        b.iter(|| {
            black_box(binding.read(black_box("key7")));
        });
    });
}

fn store_set_one_field_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_set_one_field");

    for subscriber_count in [1, 10, 100].iter() {
        let store = KeyedStore::new(wide_value(16));
        let bindings: Vec<_> = (0..*subscriber_count)
            .map(|i| {
                let binding = LazyBinding::new(store.clone(), || {
                    // Empty invalidation
                });
                binding.read(&format!("key{}", i % 16));
                binding
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    store.set_field("key0", black_box(i));
                    i += 1;
                });
            },
        );
        drop(bindings);
    }
    group.finish();
}

criterion_group!(
    benches,
    store_get_benchmark,
    binding_read_benchmark,
    store_set_one_field_benchmark,
);
criterion_main!(benches);
