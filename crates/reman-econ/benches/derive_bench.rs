use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reman_core::ScenarioInput;

fn bench_derive(c: &mut Criterion) {
    let input = ScenarioInput::default();
    c.bench_function("derive_metrics", |b| {
        b.iter(|| reman_econ::derive(black_box(&input)))
    });
}

criterion_group!(benches, bench_derive);
criterion_main!(benches);
