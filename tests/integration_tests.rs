use critpower::filter::DataFilterPipeline;
use critpower::optimizer::predict_power;
use critpower::{CpError, CriticalPowerModel, ModelConfig, OutlierSet, Sample};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Integration tests covering complete fitting sessions

const TEST_TIMES: [f64; 10] = [1.0, 5.0, 10.0, 30.0, 60.0, 180.0, 300.0, 600.0, 1200.0, 1800.0];

fn noisy_dataset(cp: f64, w_prime: f64, tau: f64, noise: f64, seed: u64) -> Vec<Sample> {
    let mut rng = StdRng::seed_from_u64(seed);
    TEST_TIMES
        .iter()
        .map(|&t| {
            let factor = 1.0 + rng.gen_range(-noise..=noise);
            Sample::new(t, predict_power(cp, w_prime, tau, t) * factor)
        })
        .collect()
}

fn config(runs: usize, outlier_detection: bool) -> ModelConfig {
    ModelConfig::builder()
        .run_count(runs)
        .outlier_detection(outlier_detection)
        .seed(2024)
        .build()
}

#[test]
fn test_convergence_on_noisy_data() {
    let data = noisy_dataset(230.0, 20000.0, 5.0, 0.02, 11);
    let mut model = CriticalPowerModel::new(config(4000, false));

    let params = *model.fit(data).unwrap();

    let cp_error = (params.cp - 230.0).abs() / 230.0;
    let w_error = (params.w_prime - 20000.0).abs() / 20000.0;
    assert!(cp_error < 0.05, "CP {} too far from 230", params.cp);
    assert!(w_error < 0.10, "W' {} too far from 20000", params.w_prime);
    assert!((params.pmax - (params.cp + params.w_prime / params.tau)).abs() < 1e-9);
    assert!(params.rmse.is_finite() && params.rmse >= 0.0);
}

#[test]
fn test_insufficient_data() {
    let data = noisy_dataset(230.0, 20000.0, 5.0, 0.0, 1);

    for n in 0..3 {
        let mut model = CriticalPowerModel::new(config(50, true));
        let result = model.fit(data[..n].to_vec());
        assert!(
            matches!(result, Err(CpError::InsufficientData { required: 3, .. })),
            "{} samples should be rejected",
            n
        );
        assert!(model.parameters().is_none());
    }
}

#[test]
fn test_filtering_below_minimum_fails_fast() {
    // Only two samples survive the validity pass
    let data = vec![
        Sample::new(10.0, 700.0),
        Sample::new(-5.0, 500.0),
        Sample::new(60.0, 0.0),
        Sample::new(300.0, 310.0),
    ];
    let mut model = CriticalPowerModel::new(config(50, true));

    assert!(matches!(
        model.fit(data),
        Err(CpError::InsufficientData { available: 2, .. })
    ));
    assert!(model.outliers().contains(&1));
    assert!(model.outliers().contains(&2));
}

#[test]
fn test_duplicate_time_keeps_strongest() {
    let data = vec![
        Sample::new(10.0, 800.0),
        Sample::new(300.0, 300.0),
        Sample::new(300.0, 250.0),
        Sample::new(600.0, 280.0),
    ];
    let mut outliers = OutlierSet::new();
    let flagged = DataFilterPipeline::flag_duplicate_times(&data, &mut outliers);

    assert_eq!(flagged, 1);
    assert!(outliers.contains(&2));
    assert!(!outliers.contains(&1));

    // Order within the group does not matter
    let swapped = vec![data[0], data[2], data[1], data[3]];
    let mut outliers = OutlierSet::new();
    DataFilterPipeline::flag_duplicate_times(&swapped, &mut outliers);
    assert!(outliers.contains(&1));
    assert!(!outliers.contains(&2));
}

#[test]
fn test_duplicate_time_flagged_during_fit() {
    let mut data = noisy_dataset(250.0, 18000.0, 10.0, 0.0, 3);
    let weaker = Sample::new(300.0, predict_power(250.0, 18000.0, 10.0, 300.0) * 0.8);
    data.insert(7, weaker);

    let mut model = CriticalPowerModel::new(config(200, true));
    model.fit(data).unwrap();

    assert!(model.outliers().contains(&7));
    assert!(model.outlier_samples().contains(&weaker));
}

#[test]
fn test_monotonic_spike_is_flagged() {
    let data = vec![
        Sample::new(1.0, 500.0),
        Sample::new(2.0, 600.0),
        Sample::new(3.0, 400.0),
    ];
    let mut outliers = OutlierSet::new();
    DataFilterPipeline::enforce_monotonic(&data, &mut outliers);

    assert_eq!(outliers.iter().copied().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn test_prediction_domain() {
    let data = noisy_dataset(250.0, 18000.0, 10.0, 0.0, 5);
    let mut model = CriticalPowerModel::new(config(300, false));
    let p = *model.fit(data).unwrap();

    assert_eq!(model.predict_time(p.cp).unwrap(), f64::INFINITY);
    assert_eq!(model.predict_time(p.cp * 0.5).unwrap(), f64::INFINITY);
    assert!(matches!(
        model.predict_time(p.pmax * 1.01),
        Err(CpError::Domain { .. })
    ));
    assert_eq!(model.predict_power(0.0).unwrap(), p.pmax);
    assert_eq!(model.predict_power(-3.0).unwrap(), p.pmax);

    for power in [p.cp + 1.0, (p.cp + p.pmax) / 2.0, p.pmax - 1.0] {
        let time = model.predict_time(power).unwrap();
        let back = model.predict_power(time).unwrap();
        assert!((back - power).abs() / power < 1e-6);
    }
}

#[test]
fn test_seeded_fits_are_reproducible() {
    let data = noisy_dataset(230.0, 20000.0, 5.0, 0.02, 8);

    let mut a = CriticalPowerModel::new(ModelConfig {
        workers: Some(1),
        ..config(100, true)
    });
    let mut b = CriticalPowerModel::new(ModelConfig {
        workers: Some(4),
        ..config(100, true)
    });

    let pa = *a.fit(data.clone()).unwrap();
    let pb = *b.fit(data).unwrap();

    assert_eq!(pa, pb);
    assert_eq!(a.outliers(), b.outliers());
}

#[test]
fn test_refit_starts_new_session() {
    let mut model = CriticalPowerModel::new(config(100, true));

    let mut dirty = noisy_dataset(250.0, 18000.0, 10.0, 0.0, 9);
    dirty.push(Sample::new(1800.0, 100.0));
    model.fit(dirty).unwrap();
    assert!(model.outliers().contains(&10));

    let clean = noisy_dataset(250.0, 18000.0, 10.0, 0.0, 9);
    model.fit(clean.clone()).unwrap();
    assert_eq!(model.data(), clean.as_slice());
    assert!(model.outliers().iter().all(|&i| i < clean.len()));
}

#[test]
fn test_zones_and_curve_from_fitted_model() {
    let data = noisy_dataset(250.0, 18000.0, 10.0, 0.0, 4);
    let mut model = CriticalPowerModel::new(config(200, false));
    let p = *model.fit(data).unwrap();

    let zones = model.training_zones().unwrap();
    let named = zones.named();
    for pair in named.windows(2).take(4) {
        assert!((pair[0].1.max - pair[1].1.min).abs() < 1e-9);
    }
    assert!((zones.threshold_zone.min - 0.95 * p.cp).abs() < 1e-9);
    assert!((zones.neuromuscular_zone.max - p.pmax).abs() < 1e-9);

    let curve: Vec<_> = model.predict_curve(1, 3600).unwrap().collect();
    assert_eq!(curve.len(), 3600);
    assert!(curve.windows(2).all(|w| w[0].power > w[1].power));
    assert!(curve.iter().all(|pt| pt.power > p.cp));
}
