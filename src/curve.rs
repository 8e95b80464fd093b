//! Predicted power-duration curves
//!
//! [`CurveIter`] walks a fitted curve one whole second at a time without
//! allocating. [`display_times`] picks the durations used for charts: every
//! second during the first minute, then progressively sparser out to an hour.

use crate::models::{CurvePoint, FittedParameters, Sample};

/// One hour in seconds
pub const DISPLAY_HORIZON: f64 = 3600.0;

/// (segment end, step) pairs, both in seconds, starting from 1 s
const DISPLAY_SEGMENTS: [(u32, u32); 4] = [(60, 1), (300, 5), (1200, 15), (3600, 60)];

/// Lazy per-second curve over an inclusive range
#[derive(Debug, Clone)]
pub struct CurveIter {
    params: FittedParameters,
    next: u32,
    end: u32,
    done: bool,
}

impl CurveIter {
    pub(crate) fn new(params: FittedParameters, from: u32, to: u32) -> Self {
        Self {
            params,
            next: from,
            end: to,
            done: from > to,
        }
    }
}

impl Iterator for CurveIter {
    type Item = CurvePoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let time = self.next as f64;
        if self.next == self.end {
            self.done = true;
        } else {
            self.next += 1;
        }
        Some(CurvePoint {
            time,
            power: self.params.power_at(time),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.done {
            0
        } else {
            (self.end - self.next) as usize + 1
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CurveIter {}

/// Durations used for a display curve.
///
/// Dense at short durations, sparse at long ones, always including every
/// sample time so the curve can be compared point-for-point with the input.
/// The result is sorted and de-duplicated and extends past an hour when the
/// input does.
pub fn display_times(samples: &[Sample]) -> Vec<f64> {
    let mut times: Vec<f64> = Vec::with_capacity(200 + samples.len());

    let mut t = 1u32;
    for &(end, step) in DISPLAY_SEGMENTS.iter() {
        while t < end {
            times.push(t as f64);
            t += step;
        }
    }
    times.push(DISPLAY_HORIZON);

    let longest = samples
        .iter()
        .map(|s| s.time)
        .filter(|t| t.is_finite())
        .fold(0.0f64, f64::max);
    if longest > DISPLAY_HORIZON {
        let mut t = DISPLAY_HORIZON + 300.0;
        while t < longest {
            times.push(t);
            t += 300.0;
        }
        times.push(longest);
    }

    times.extend(
        samples
            .iter()
            .map(|s| s.time)
            .filter(|t| t.is_finite() && *t > 0.0),
    );

    times.sort_by(|a, b| a.total_cmp(b));
    times.dedup();
    times
}

/// Predicted curve at the display durations
pub fn display_curve(params: &FittedParameters, samples: &[Sample]) -> Vec<CurvePoint> {
    display_times(samples)
        .into_iter()
        .map(|time| CurvePoint {
            time,
            power: params.power_at(time),
        })
        .collect()
}
