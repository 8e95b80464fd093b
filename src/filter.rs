//! Structural sanitization of raw samples
//!
//! Four passes run in a fixed order and only ever add indices to the outlier
//! set. The dataset itself is never reordered or modified:
//!
//! 1. structural validity (non-positive or implausible values)
//! 2. duplicate-time resolution (keep the highest power per duration)
//! 3. monotonic consistency (power must not rise with duration)
//! 4. jump detection (large power swings between near-identical durations)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::models::{OutlierSet, Sample, MAX_PLAUSIBLE_POWER};

/// Relative closeness in time that makes two adjacent samples comparable
const JUMP_TIME_RATIO: f64 = 0.2;
/// Relative power change between comparable samples that counts as a jump
const JUMP_POWER_RATIO: f64 = 0.2;

/// Limits used by the structural validity pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Highest plausible power in watts
    pub max_power: f64,

    /// Longest accepted effort in seconds (None disables the check)
    pub max_time: Option<f64>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_power: MAX_PLAUSIBLE_POWER,
            max_time: Some(3600.0),
        }
    }
}

/// Number of indices each pass newly flagged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub invalid: usize,
    pub duplicates: usize,
    pub non_monotonic: usize,
    pub jumps: usize,
}

impl FilterReport {
    pub fn total(&self) -> usize {
        self.invalid + self.duplicates + self.non_monotonic + self.jumps
    }
}

/// Ordered sanitization passes over a dataset
#[derive(Debug, Clone, Default)]
pub struct DataFilterPipeline {
    config: FilterConfig,
}

impl DataFilterPipeline {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Run all four passes, adding flagged indices to `outliers`
    pub fn run(&self, data: &[Sample], outliers: &mut OutlierSet) -> FilterReport {
        let report = FilterReport {
            invalid: self.flag_invalid(data, outliers),
            duplicates: Self::flag_duplicate_times(data, outliers),
            non_monotonic: Self::enforce_monotonic(data, outliers),
            jumps: Self::flag_jumps(data, outliers),
        };

        debug!(
            invalid = report.invalid,
            duplicates = report.duplicates,
            non_monotonic = report.non_monotonic,
            jumps = report.jumps,
            "Data filter passes complete"
        );
        report
    }

    /// Pass 1: values that cannot describe a real effort
    pub fn flag_invalid(&self, data: &[Sample], outliers: &mut OutlierSet) -> usize {
        let mut flagged = 0;
        for (i, s) in data.iter().enumerate() {
            let too_long = self.config.max_time.is_some_and(|max| s.time > max);
            let invalid = !s.time.is_finite()
                || !s.power.is_finite()
                || s.power <= 0.0
                || s.power > self.config.max_power
                || s.time <= 0.0
                || too_long;
            if invalid && outliers.insert(i) {
                flagged += 1;
            }
        }
        flagged
    }

    /// Pass 2: among samples sharing a duration keep only the strongest.
    ///
    /// Ties keep the earlier sample.
    pub fn flag_duplicate_times(data: &[Sample], outliers: &mut OutlierSet) -> usize {
        let mut best_at: HashMap<u64, usize> = HashMap::with_capacity(data.len());
        let mut flagged = 0;

        for (i, s) in data.iter().enumerate() {
            let key = s.time.to_bits();
            let loser = match best_at.get(&key).copied() {
                Some(best) if s.power > data[best].power => {
                    best_at.insert(key, i);
                    best
                }
                Some(_) => i,
                None => {
                    best_at.insert(key, i);
                    continue;
                }
            };
            if outliers.insert(loser) {
                flagged += 1;
            }
        }
        flagged
    }

    /// Pass 3: power must be non-increasing with duration.
    ///
    /// Walks the surviving samples in order with a stack of kept indices whose
    /// powers are non-increasing from bottom to top. A sample above the top is
    /// either a spike (the next sample fits back under the top, or there is no
    /// next sample), which is flagged, or the top is a dip, which is popped
    /// and flagged before the sample is re-tested once against the new top.
    pub fn enforce_monotonic(data: &[Sample], outliers: &mut OutlierSet) -> usize {
        let candidates: Vec<usize> = (0..data.len()).filter(|i| !outliers.contains(i)).collect();
        let mut kept: Vec<usize> = Vec::with_capacity(candidates.len());
        let mut flagged = Vec::new();

        for (pos, &i) in candidates.iter().enumerate() {
            let power = data[i].power;
            let Some(&top) = kept.last() else {
                kept.push(i);
                continue;
            };
            if power <= data[top].power {
                kept.push(i);
                continue;
            }

            let next_fits_under_top = candidates
                .get(pos + 1)
                .map_or(true, |&next| data[next].power <= data[top].power);
            if next_fits_under_top {
                flagged.push(i);
                continue;
            }

            kept.pop();
            flagged.push(top);
            match kept.last() {
                Some(&new_top) if power > data[new_top].power => flagged.push(i),
                _ => kept.push(i),
            }
        }

        flagged.into_iter().filter(|&i| outliers.insert(i)).count()
    }

    /// Pass 4: sharp power changes between samples close together in time.
    ///
    /// Each surviving sample is compared with the last sample that is still
    /// kept, so flagged samples never serve as a reference.
    pub fn flag_jumps(data: &[Sample], outliers: &mut OutlierSet) -> usize {
        let mut flagged = 0;
        let mut reference: Option<usize> = None;

        for (i, cur) in data.iter().enumerate() {
            if outliers.contains(&i) {
                continue;
            }
            let Some(r) = reference else {
                reference = Some(i);
                continue;
            };
            let prev = data[r];
            let close_in_time = (cur.time - prev.time).abs() < JUMP_TIME_RATIO * prev.time;
            let big_change = (cur.power - prev.power).abs() > JUMP_POWER_RATIO * prev.power;
            if close_in_time && big_change {
                outliers.insert(i);
                flagged += 1;
            } else {
                reference = Some(i);
            }
        }
        flagged
    }
}
