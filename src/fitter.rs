//! Parallel multi-start search
//!
//! Runs many independent annealing attempts from random starting points on a
//! fixed worker pool and keeps the best result:
//! - attempt tokens flow through a bounded queue sized to the run count
//! - each worker pulls a token, draws a starting guess and anneals to completion
//! - results are collected once every worker has joined
//!
//! Selection uses the relative error so short sprints do not dominate the fit.

use crossbeam::channel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::ThreadPool;
use std::ops::Range;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

use crate::error::{CpError, Result};
use crate::models::{FittedParameters, Sample};
use crate::optimizer::{anneal, AnnealingSchedule, Guess, Solution};

/// Minimum number of samples needed to fit three parameters
pub const MIN_SAMPLES: usize = 3;

/// Ranges from which starting guesses are drawn
#[derive(Debug, Clone, PartialEq)]
pub struct SearchWindow {
    pub cp: Range<f64>,
    pub w_prime: Range<f64>,
    pub tau: Range<f64>,
}

impl SearchWindow {
    /// Estimate the window from the data.
    ///
    /// CP usually sits between the lowest observed power and the lower
    /// quartile of all powers; W' and tau use fixed broad ranges.
    pub fn estimate(data: &[Sample]) -> Self {
        let mut powers: Vec<f64> = data.iter().map(|s| s.power).collect();
        powers.sort_by(|a, b| a.total_cmp(b));

        let min_cp = powers.first().copied().unwrap_or(0.0) * 0.9;
        let max_cp = powers.get(powers.len() / 4).copied().unwrap_or(min_cp);

        Self {
            cp: min_cp..max_cp,
            w_prime: 5000.0..35000.0,
            tau: 0.5..25.5,
        }
    }

    /// Draw a uniform starting guess
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Guess {
        Guess::new(
            uniform(rng, &self.cp),
            uniform(rng, &self.w_prime),
            uniform(rng, &self.tau),
        )
    }
}

// `gen_range` panics on empty ranges, which a flat dataset produces for CP
fn uniform<R: Rng>(rng: &mut R, range: &Range<f64>) -> f64 {
    range.start + rng.gen::<f64>() * (range.end - range.start)
}

/// Multi-start parallel fitter
///
/// The worker pool is built on the first fit and reused by every later one,
/// including the refits of a refinement session. Clones share it.
#[derive(Debug, Clone)]
pub struct ModelFitter {
    run_count: usize,
    workers: usize,
    schedule: AnnealingSchedule,
    seed: Option<u64>,
    pool: OnceLock<Arc<ThreadPool>>,
}

impl ModelFitter {
    /// Create a fitter running `run_count` attempts on one worker per CPU
    pub fn new(run_count: usize) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            run_count: run_count.max(1),
            workers,
            schedule: AnnealingSchedule::default(),
            seed: None,
            pool: OnceLock::new(),
        }
    }

    /// Override the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self.pool = OnceLock::new();
        self
    }

    pub fn with_schedule(mut self, schedule: AnnealingSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Make every attempt draw from a deterministic stream.
    ///
    /// Attempt `k` is seeded with `seed + k`, so the outcome does not depend on
    /// which worker picked it up.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn run_count(&self) -> usize {
        self.run_count
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// The worker pool, built on first use
    pub fn thread_pool(&self) -> Result<Arc<ThreadPool>> {
        if let Some(pool) = self.pool.get() {
            return Ok(Arc::clone(pool));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("critpower-fit-{}", i))
            .build()
            .map_err(|e| CpError::ThreadPool(e.to_string()))?;
        debug!(workers = self.workers, "Worker pool created");

        Ok(Arc::clone(self.pool.get_or_init(|| Arc::new(pool))))
    }

    /// Fit the curve to `data`, which must already exclude outliers.
    pub fn fit(&self, data: &[Sample]) -> Result<FittedParameters> {
        if data.len() < MIN_SAMPLES {
            return Err(CpError::InsufficientData {
                required: MIN_SAMPLES,
                available: data.len(),
            });
        }

        let window = SearchWindow::estimate(data);
        debug!(
            samples = data.len(),
            runs = self.run_count,
            workers = self.workers,
            cp_min = window.cp.start,
            cp_max = window.cp.end,
            "Starting parallel search"
        );

        let solutions = self.run_attempts(data, &window)?;
        let attempts = solutions.len();

        let best = solutions
            .into_iter()
            .min_by(|a, b| a.relative_mse.total_cmp(&b.relative_mse))
            .ok_or_else(|| {
                CpError::OptimizationFailure(format!(
                    "all {} attempts failed to converge",
                    self.run_count
                ))
            })?;

        debug!(
            succeeded = attempts,
            cp = best.cp,
            w_prime = best.w_prime,
            tau = best.tau,
            relative_mse = best.relative_mse,
            "Parallel search finished"
        );

        Ok(FittedParameters::new(
            best.cp,
            best.w_prime,
            best.tau,
            best.absolute_mse.sqrt(),
        ))
    }

    fn run_attempts(&self, data: &[Sample], window: &SearchWindow) -> Result<Vec<Solution>> {
        let pool = self.thread_pool()?;

        let (task_tx, task_rx) = channel::bounded::<usize>(self.run_count);
        let (result_tx, result_rx) = channel::bounded::<Solution>(self.run_count);

        // The queue holds every token, so filling it never blocks
        for attempt in 0..self.run_count {
            let _ = task_tx.send(attempt);
        }
        drop(task_tx);

        pool.scope(|scope| {
            for _ in 0..self.workers {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move |_| {
                    for attempt in task_rx.iter() {
                        let mut rng = match self.seed {
                            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(attempt as u64)),
                            None => StdRng::from_entropy(),
                        };
                        let initial = window.sample(&mut rng);
                        match anneal(data, initial, &self.schedule, &mut rng) {
                            Ok(solution) => {
                                let _ = result_tx.send(solution);
                            }
                            Err(err) => trace!(attempt, %err, "Dropping failed attempt"),
                        }
                    }
                });
            }
        });
        drop(result_tx);

        Ok(result_rx.iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::predict_power;

    fn clean_data() -> Vec<Sample> {
        [1.0, 5.0, 10.0, 30.0, 60.0, 180.0, 300.0, 600.0, 1200.0, 1800.0]
            .iter()
            .map(|&t| Sample::new(t, predict_power(230.0, 20000.0, 5.0, t)))
            .collect()
    }

    #[test]
    fn test_search_window_estimate() {
        let data = vec![
            Sample::new(1.0, 900.0),
            Sample::new(60.0, 400.0),
            Sample::new(300.0, 300.0),
            Sample::new(1200.0, 250.0),
        ];
        let window = SearchWindow::estimate(&data);
        assert!((window.cp.start - 225.0).abs() < 1e-9);
        // sorted powers [250, 300, 400, 900]; index 4 / 4 = 1
        assert_eq!(window.cp.end, 300.0);
        assert_eq!(window.w_prime, 5000.0..35000.0);
    }

    #[test]
    fn test_search_window_sampling_stays_inside() {
        let window = SearchWindow::estimate(&clean_data());
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let guess = window.sample(&mut rng);
            assert!(guess.cp >= window.cp.start && guess.cp <= window.cp.end);
            assert!(guess.w_prime >= 5000.0 && guess.w_prime < 35000.0);
            assert!(guess.tau >= 0.5 && guess.tau < 25.5);
        }
    }

    #[test]
    fn test_insufficient_data() {
        let fitter = ModelFitter::new(10);
        let result = fitter.fit(&clean_data()[..2]);
        assert!(matches!(
            result,
            Err(CpError::InsufficientData {
                required: 3,
                available: 2
            })
        ));
    }

    #[test]
    fn test_run_count_and_workers_are_at_least_one() {
        let fitter = ModelFitter::new(0).with_workers(0);
        assert_eq!(fitter.run_count(), 1);
        assert_eq!(fitter.workers(), 1);
    }

    #[test]
    fn test_fit_recovers_exact_curve() {
        let fitter = ModelFitter::new(400).with_seed(Some(42));
        let params = fitter.fit(&clean_data()).unwrap();

        assert!((params.cp - 230.0).abs() / 230.0 < 0.05, "cp = {}", params.cp);
        assert!(params.rmse.is_finite());
        assert!((params.pmax - (params.cp + params.w_prime / params.tau)).abs() < 1e-9);
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let data = clean_data();
        let a = ModelFitter::new(64).with_workers(4).with_seed(Some(9)).fit(&data).unwrap();
        let b = ModelFitter::new(64).with_workers(2).with_seed(Some(9)).fit(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pool_is_reused_across_fits() {
        let data = clean_data();
        let fitter = ModelFitter::new(16).with_workers(2).with_seed(Some(3));
        fitter.fit(&data).unwrap();
        let first = fitter.thread_pool().unwrap();
        fitter.fit(&data).unwrap();
        let second = fitter.thread_pool().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.current_num_threads(), 2);
        assert!(Arc::ptr_eq(&first, &fitter.clone().thread_pool().unwrap()));

        let resized = fitter.with_workers(3);
        let third = resized.thread_pool().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.current_num_threads(), 3);
    }

    #[test]
    fn test_all_attempts_failing_is_reported() {
        let data = vec![Sample::new(1.0, 0.001), Sample::new(2.0, 0.001), Sample::new(3.0, 0.001)];
        let result = ModelFitter::new(8).with_seed(Some(1)).fit(&data);
        assert!(matches!(result, Err(CpError::OptimizationFailure(_))));
    }
}
