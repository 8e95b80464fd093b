use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use critpower::filter::DataFilterPipeline;
use critpower::optimizer::{anneal, predict_power, AnnealingSchedule, Guess};
use critpower::{CriticalPowerModel, ModelConfig, ModelFitter, OutlierSet, Sample};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Benchmarks for the fitting pipeline
///
/// Covers a single annealing run, the parallel multi-start search at
/// increasing run counts, the filter passes and a full session.

const DURATIONS: [f64; 12] = [
    1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 180.0, 300.0, 600.0, 1200.0, 1800.0, 3600.0,
];

fn create_dataset() -> Vec<Sample> {
    DURATIONS
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let wobble = if i % 2 == 0 { 1.015 } else { 0.985 };
            Sample::new(t, predict_power(260.0, 21000.0, 6.0, t) * wobble)
        })
        .collect()
}

fn create_large_dataset(size: usize) -> Vec<Sample> {
    (1..=size)
        .map(|i| {
            let t = i as f64 * 3600.0 / size as f64;
            Sample::new(t, predict_power(260.0, 21000.0, 6.0, t))
        })
        .collect()
}

fn bench_single_anneal(c: &mut Criterion) {
    let data = create_dataset();
    let schedule = AnnealingSchedule::default();

    c.bench_function("anneal_single_run", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| {
            let _ = anneal(
                black_box(&data),
                Guess::new(200.0, 15000.0, 10.0),
                &schedule,
                &mut rng,
            );
        });
    });
}

fn bench_parallel_fit(c: &mut Criterion) {
    let data = create_dataset();
    let mut group = c.benchmark_group("Parallel Fit");
    group.sample_size(10);

    for &runs in &[10, 100, 1000] {
        let fitter = ModelFitter::new(runs).with_seed(Some(7));
        group.throughput(Throughput::Elements(runs as u64));
        group.bench_with_input(BenchmarkId::new("fit", runs), &data, |b, data| {
            b.iter(|| {
                let _ = fitter.fit(black_box(data));
            });
        });
    }

    group.finish();
}

fn bench_filter_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Filter Pipeline");
    let pipeline = DataFilterPipeline::default();

    for &size in &[100, 1000, 10000] {
        let data = create_large_dataset(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("run", size), &data, |b, data| {
            b.iter(|| {
                let mut outliers = OutlierSet::new();
                pipeline.run(black_box(data), &mut outliers);
            });
        });
    }

    group.finish();
}

fn bench_full_session(c: &mut Criterion) {
    let data = create_dataset();
    let mut group = c.benchmark_group("Session");
    group.sample_size(10);

    group.bench_function("fit_with_outlier_detection", |b| {
        b.iter(|| {
            let config = ModelConfig::builder().run_count(100).seed(3).build();
            let mut model = CriticalPowerModel::new(config);
            let _ = model.fit(black_box(data.clone()));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_anneal,
    bench_parallel_fit,
    bench_filter_pipeline,
    bench_full_session
);
criterion_main!(benches);
