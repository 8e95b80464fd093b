//! Outlier detection against a fitted curve
//!
//! Two detectors, both additive:
//! - an IQR test on relative residuals of the surviving samples
//! - a physiological heuristic for efforts that were clearly not maximal

use tracing::debug;

use crate::models::{FittedParameters, OutlierSet, Sample};

/// Duration beyond which sub-maximal efforts are easy to recognise (seconds)
const LONG_EFFORT_SECONDS: f64 = 600.0;
/// Fraction of predicted power below which a long effort is non-maximal
const NON_MAXIMAL_RATIO: f64 = 0.9;
/// Fewer surviving samples than this make the quartiles degenerate
const MIN_IQR_SAMPLES: usize = 4;

/// Stateless outlier detectors
pub struct OutlierDetector;

impl OutlierDetector {
    /// Flag samples whose relative residual exceeds `Q3 + threshold·IQR`.
    ///
    /// Only samples not already in `outliers` take part. Quartiles are read
    /// at indices `n/4` and `3·(n/4)` of the sorted residuals without
    /// interpolation. Returns the number of newly flagged samples.
    pub fn residual_iqr(
        data: &[Sample],
        params: &FittedParameters,
        threshold: f64,
        outliers: &mut OutlierSet,
    ) -> usize {
        let residuals: Vec<(usize, f64)> = data
            .iter()
            .enumerate()
            .filter(|(i, _)| !outliers.contains(i))
            .map(|(i, s)| (i, (params.power_at(s.time) - s.power).abs() / s.power))
            .collect();

        if residuals.len() < MIN_IQR_SAMPLES {
            debug!(
                surviving = residuals.len(),
                "Skipping residual test: too few samples"
            );
            return 0;
        }

        let mut sorted: Vec<f64> = residuals.iter().map(|&(_, r)| r).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1_idx = sorted.len() / 4;
        let q1 = sorted[q1_idx];
        let q3 = sorted[q1_idx * 3];
        let upper_bound = q3 + threshold * (q3 - q1);

        let flagged = residuals
            .into_iter()
            .filter(|&(_, r)| r > upper_bound)
            .filter(|&(i, _)| outliers.insert(i))
            .count();

        debug!(q1, q3, upper_bound, flagged, "Residual IQR test");
        flagged
    }

    /// Flag efforts that were evidently not maximal.
    ///
    /// A sample is flagged when it lasted longer than ten minutes and fell
    /// more than 10% short of the curve, or when it sits below CP at all.
    pub fn non_maximal_effort(
        data: &[Sample],
        params: &FittedParameters,
        outliers: &mut OutlierSet,
    ) -> usize {
        let flagged = data
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                let short_of_curve = s.time > LONG_EFFORT_SECONDS
                    && s.power < NON_MAXIMAL_RATIO * params.power_at(s.time);
                short_of_curve || s.power < params.cp
            })
            .filter(|&(i, _)| outliers.insert(i))
            .count();

        debug!(flagged, "Non-maximal effort test");
        flagged
    }
}
