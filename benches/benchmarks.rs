use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use std::hint::black_box;

use larder::{define_store, CentralOptions, CentralStore, Memo, Registry, Signal, StoreOptions};

fn signal_read_write_benchmark(c: &mut Criterion) {
    let signal: Signal<i32> = Signal::new(0);

    c.bench_function("signal_read", |b| {
        b.iter(|| {
            black_box(signal.get());
        });
    });

    c.bench_function("signal_write", |b| {
        let mut i = 0;
        b.iter(|| {
            signal.set(black_box(i));
            i += 1;
        });
    });
}

fn memo_cached_read_benchmark(c: &mut Criterion) {
    let a: Signal<i32> = Signal::new(5);
    let b: Signal<i32> = Signal::new(10);

    let sum = Memo::new({
        let a = a.clone();
        let b = b.clone();
        move || a.get() + b.get()
    });

    c.bench_function("memo_cached_read", |bench| {
        bench.iter(|| {
            black_box(sum.get());
        });
    });
}

fn counter_options() -> StoreOptions {
    StoreOptions::new("counter")
        .state(|| json!({ "count": 0 }))
        .getter("double", |store| {
            json!(store.get_as::<i64>("count").unwrap_or(0) * 2)
        })
        .action("increment", |store, _| {
            store.state().update_as::<i64>("count", |n| *n += 1)?;
            Ok(Value::Null)
        })
}

fn use_store_lookup_benchmark(c: &mut Criterion) {
    let registry = Registry::new();
    let use_counter = define_store(counter_options());
    use_counter.use_store_in(&registry).unwrap();

    c.bench_function("use_store_lookup", |b| {
        b.iter(|| {
            black_box(use_counter.use_store_in(&registry).unwrap());
        });
    });
}

fn action_and_getter_benchmark(c: &mut Criterion) {
    let registry = Registry::new();
    let store = define_store(counter_options())
        .use_store_in(&registry)
        .unwrap();

    c.bench_function("action_then_getter", |b| {
        b.iter(|| {
            store.call("increment", Value::Null).unwrap();
            black_box(store.get("double"));
        });
    });
}

fn patch_subscribe_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("patch_subscribe");

    for subscriber_count in [1, 10, 100].iter() {
        let registry = Registry::new();
        let store = define_store(counter_options())
            .use_store_in(&registry)
            .unwrap();

        for _ in 0..*subscriber_count {
            let _ = store.subscribe(|_, _| {
                // Empty subscriber
            });
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    let value = black_box(i);
                    store
                        .patch_with(move |state| {
                            let _ = state.set("count", json!(value));
                        })
                        .unwrap();
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

fn central_commit_benchmark(c: &mut Criterion) {
    let store = CentralStore::new(
        CentralOptions::new()
            .state(json!({ "count": 0 }))
            .mutation("increment", |state, _| {
                state.update_as::<i64>("count", |n| *n += 1)
            }),
    )
    .unwrap();

    c.bench_function("central_commit", |b| {
        b.iter(|| {
            store.commit(black_box("increment"), Value::Null).unwrap();
        });
    });
}

criterion_group!(
    benches,
    signal_read_write_benchmark,
    memo_cached_read_benchmark,
    use_store_lookup_benchmark,
    action_and_getter_benchmark,
    patch_subscribe_benchmark,
    central_commit_benchmark,
);
criterion_main!(benches);
