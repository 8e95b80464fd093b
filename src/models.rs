use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Highest power accepted as a physically plausible effort (watts)
pub const MAX_PLAUSIBLE_POWER: f64 = 3000.0;

/// A single best effort: the power an athlete sustained for a given duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Effort duration in seconds
    pub time: f64,

    /// Sustained power in watts
    pub power: f64,
}

impl Sample {
    pub fn new(time: f64, power: f64) -> Self {
        Self { time, power }
    }
}

impl From<(f64, f64)> for Sample {
    fn from((time, power): (f64, f64)) -> Self {
        Self { time, power }
    }
}

/// Indices into the bound dataset that have been flagged as outliers.
///
/// Indices always refer to positions in the original input, never to a
/// filtered view. Within a fitting session the set only grows.
pub type OutlierSet = BTreeSet<usize>;

/// Parameters of a fitted three-parameter critical power curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedParameters {
    /// Critical power in watts
    pub cp: f64,

    /// Anaerobic work capacity above CP in joules
    pub w_prime: f64,

    /// Time constant in seconds
    pub tau: f64,

    /// Modelled maximal instantaneous power, always `cp + w_prime / tau`
    pub pmax: f64,

    /// Root mean squared fit residual in watts
    pub rmse: f64,
}

impl FittedParameters {
    /// Build parameters from the three free values; `pmax` is derived.
    pub fn new(cp: f64, w_prime: f64, tau: f64, rmse: f64) -> Self {
        Self {
            cp,
            w_prime,
            tau,
            pmax: cp + w_prime / tau,
            rmse,
        }
    }

    /// Power the curve predicts for an effort of `time` seconds
    pub fn power_at(&self, time: f64) -> f64 {
        if time <= 0.0 {
            return self.pmax;
        }
        (self.w_prime + self.cp * (time + self.tau)) / (time + self.tau)
    }
}

/// One point of a predicted power-duration curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Duration in seconds
    pub time: f64,

    /// Predicted maximal power in watts
    pub power: f64,
}
