//! Benchmarks for the reactive engine.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use filament_core::reactive::{Expr, Runtime, Scope, Watcher, WatcherKind};

fn bench_scope_read(c: &mut Criterion) {
    let runtime = Runtime::new();
    let scope = Scope::new(&runtime);
    scope.set("user.profile.name", "ada").unwrap();

    c.bench_function("scope_peek_nested", |b| {
        b.iter(|| black_box(scope.peek("user.profile.name").unwrap()))
    });
}

fn bench_watcher_create(c: &mut Criterion) {
    let runtime = Runtime::new();
    let scope = Scope::new(&runtime);
    scope.set("x", 1).unwrap();

    c.bench_function("watcher_create_path", |b| {
        b.iter(|| {
            let watcher =
                Watcher::new(&scope, Expr::path("x"), WatcherKind::Effect).unwrap();
            watcher.teardown();
            black_box(watcher)
        })
    });
}

fn bench_set_and_flush(c: &mut Criterion) {
    let runtime = Runtime::new();
    let scope = Scope::new(&runtime);
    scope.set("x", 0).unwrap();
    let _watcher = Watcher::new(&scope, Expr::path("x"), WatcherKind::Effect).unwrap();

    let mut i = 0i64;
    c.bench_function("set_and_flush", |b| {
        b.iter(|| {
            i += 1;
            scope.set("x", i).unwrap();
            runtime.flush();
        })
    });
}

fn bench_computed_pull_cached(c: &mut Criterion) {
    let runtime = Runtime::new();
    let scope = Scope::new(&runtime);
    scope.set("x", 21).unwrap();

    let computed = Watcher::new(&scope, Expr::path("x"), WatcherKind::Computed).unwrap();
    computed.evaluate().unwrap();

    c.bench_function("computed_pull_cached", |b| {
        b.iter(|| black_box(computed.computed_value().unwrap()))
    });
}

fn bench_computed_pull_dirty(c: &mut Criterion) {
    let runtime = Runtime::new();
    let scope = Scope::new(&runtime);
    scope.set("x", 0).unwrap();

    let computed = Watcher::new(&scope, Expr::path("x"), WatcherKind::Computed).unwrap();

    let mut i = 0i64;
    c.bench_function("computed_pull_dirty", |b| {
        b.iter(|| {
            i += 1;
            scope.set("x", i).unwrap();
            black_box(computed.computed_value().unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_scope_read,
    bench_watcher_create,
    bench_set_and_flush,
    bench_computed_pull_cached,
    bench_computed_pull_dirty,
);
criterion_main!(benches);
