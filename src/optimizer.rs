//! Single-run simulated annealing over `(cp, w_prime, tau)`
//!
//! One call explores the parameter space from a single starting guess. The
//! search accepts worse candidates with Metropolis probability so it can leave
//! shallow basins, reheats after long stretches without improvement and keeps
//! the best solution seen regardless of where the walk ends up.
//!
//! The objective is the relative mean squared error, which keeps the many
//! long, low-power efforts from being swamped by a few short sprints.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CpError, Result};
use crate::models::Sample;

/// Lower bounds applied to every proposal
pub const MIN_CP: f64 = 50.0;
pub const MIN_W_PRIME: f64 = 500.0;
pub const MIN_TAU: f64 = 0.5;

/// Best relative error above which a run is treated as diverged
pub const DIVERGENCE_THRESHOLD: f64 = 1000.0;

/// Annealing schedule and step sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealingSchedule {
    pub initial_temperature: f64,
    pub final_temperature: f64,
    /// Multiplicative cooling applied every iteration
    pub cooling_rate: f64,
    pub max_iterations: usize,
    /// Non-improving iterations before the temperature is raised
    pub reheat_after: usize,
    pub reheat_factor: f64,
    /// Base step sizes at the initial temperature
    pub cp_step: f64,
    pub w_prime_step: f64,
    pub tau_step: f64,
}

impl Default for AnnealingSchedule {
    fn default() -> Self {
        Self {
            initial_temperature: 2000.0,
            final_temperature: 0.01,
            cooling_rate: 0.97,
            max_iterations: 20_000,
            reheat_after: 1000,
            reheat_factor: 1.5,
            cp_step: 5.0,
            w_prime_step: 1000.0,
            tau_step: 1.0,
        }
    }
}

/// A point in parameter space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Guess {
    pub cp: f64,
    pub w_prime: f64,
    pub tau: f64,
}

impl Guess {
    pub fn new(cp: f64, w_prime: f64, tau: f64) -> Self {
        Self { cp, w_prime, tau }
    }

    fn clamped(self) -> Self {
        Self {
            cp: self.cp.max(MIN_CP),
            w_prime: self.w_prime.max(MIN_W_PRIME),
            tau: self.tau.max(MIN_TAU),
        }
    }
}

/// Outcome of a successful annealing run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    pub cp: f64,
    pub w_prime: f64,
    pub tau: f64,
    /// Mean squared relative residual at the solution
    pub relative_mse: f64,
    /// Mean squared residual in watts² at the solution
    pub absolute_mse: f64,
    /// Iterations actually performed
    pub iterations: usize,
}

/// Three-parameter hyperbolic model: `(W' + CP·(t+τ)) / (t+τ)`
#[inline]
pub fn predict_power(cp: f64, w_prime: f64, tau: f64, time: f64) -> f64 {
    (w_prime + cp * (time + tau)) / (time + tau)
}

/// Mean of squared `(predicted - observed) / observed`
pub fn relative_mse(data: &[Sample], cp: f64, w_prime: f64, tau: f64) -> f64 {
    if data.is_empty() {
        return f64::INFINITY;
    }
    let sum: f64 = data
        .iter()
        .map(|s| {
            let rel = (predict_power(cp, w_prime, tau, s.time) - s.power) / s.power;
            rel * rel
        })
        .sum();
    sum / data.len() as f64
}

/// Mean of squared `predicted - observed` in watts²
pub fn absolute_mse(data: &[Sample], cp: f64, w_prime: f64, tau: f64) -> f64 {
    if data.is_empty() {
        return f64::INFINITY;
    }
    let sum: f64 = data
        .iter()
        .map(|s| {
            let err = predict_power(cp, w_prime, tau, s.time) - s.power;
            err * err
        })
        .sum();
    sum / data.len() as f64
}

/// Run one annealing search from `initial`.
///
/// Fails with [`CpError::OptimizationFailure`] when the best relative error
/// found is non-finite or above [`DIVERGENCE_THRESHOLD`].
pub fn anneal<R: Rng>(
    data: &[Sample],
    initial: Guess,
    schedule: &AnnealingSchedule,
    rng: &mut R,
) -> Result<Solution> {
    let mut current = initial.clamped();
    let mut current_error = relative_mse(data, current.cp, current.w_prime, current.tau);

    let mut best = current;
    let mut best_error = current_error;

    let mut temperature = schedule.initial_temperature;
    let mut stale = 0usize;
    let mut iterations = 0usize;

    while iterations < schedule.max_iterations && temperature > schedule.final_temperature {
        iterations += 1;

        let scale = temperature / schedule.initial_temperature;
        let candidate = Guess {
            cp: current.cp + rng.gen_range(-1.0..=1.0) * schedule.cp_step * scale,
            w_prime: current.w_prime + rng.gen_range(-1.0..=1.0) * schedule.w_prime_step * scale,
            tau: current.tau + rng.gen_range(-1.0..=1.0) * schedule.tau_step * scale,
        }
        .clamped();

        let candidate_error = relative_mse(data, candidate.cp, candidate.w_prime, candidate.tau);

        let accept = if candidate_error < current_error {
            true
        } else {
            let delta = candidate_error - current_error;
            rng.gen::<f64>() < (-delta / temperature).exp()
        };

        if accept {
            current = candidate;
            current_error = candidate_error;
        }

        if accept && current_error < best_error {
            best = current;
            best_error = current_error;
            stale = 0;
        } else {
            stale += 1;
        }

        if stale >= schedule.reheat_after {
            temperature *= schedule.reheat_factor;
            stale = 0;
        } else {
            temperature *= schedule.cooling_rate;
        }
    }

    if !best_error.is_finite() || best_error > DIVERGENCE_THRESHOLD {
        return Err(CpError::OptimizationFailure(format!(
            "annealing diverged with relative error {}",
            best_error
        )));
    }

    Ok(Solution {
        cp: best.cp,
        w_prime: best.w_prime,
        tau: best.tau,
        relative_mse: best_error,
        absolute_mse: absolute_mse(data, best.cp, best.w_prime, best.tau),
        iterations,
    })
}
