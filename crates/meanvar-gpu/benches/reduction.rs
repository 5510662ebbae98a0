use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meanvar_gpu::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_data(n: usize) -> Vec<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    (0..n).map(|_| rng.gen_range(0.0..100.0)).collect()
}

fn bench_mean(c: &mut Criterion) {
    let engine = AggregateEngine::new(HostDevice::new()).unwrap();
    let mut group = c.benchmark_group("mean");

    for size in [1_000, 100_000, 1 << 20].iter() {
        let data = random_data(*size);

        // CPU baseline
        group.bench_with_input(BenchmarkId::new("reference", size), size, |bench, _| {
            bench.iter(|| black_box(host_mean(black_box(&data)).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("host_device", size), size, |bench, _| {
            bench.iter(|| black_box(engine.compute_mean(black_box(&data)).unwrap()));
        });
    }

    group.finish();
}

fn bench_variance(c: &mut Criterion) {
    let engine = AggregateEngine::new(HostDevice::new()).unwrap();
    let mut group = c.benchmark_group("variance");

    for size in [1_000, 100_000, 1 << 20].iter() {
        let data = random_data(*size);
        let mean = host_mean(&data).unwrap();

        group.bench_with_input(BenchmarkId::new("reference", size), size, |bench, _| {
            bench.iter(|| black_box(host_variance(black_box(&data), mean).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("host_device", size), size, |bench, _| {
            bench.iter(|| black_box(engine.compute_variance(black_box(&data), mean).unwrap()));
        });
    }

    group.finish();
}

fn bench_strategies(c: &mut Criterion) {
    let data = random_data(1 << 20);
    let mut group = c.benchmark_group("host_strategy");

    for strategy in [ExecutionStrategy::Serial, ExecutionStrategy::ParallelGroups] {
        let engine = AggregateEngine::new(HostDevice::new().with_strategy(strategy)).unwrap();
        group.bench_function(format!("{strategy:?}"), |bench| {
            bench.iter(|| black_box(engine.compute_mean_variance(black_box(&data)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_mean, bench_variance, bench_strategies);
criterion_main!(benches);
