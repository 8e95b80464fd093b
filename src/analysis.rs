//! Request/report layer around [`CriticalPowerModel`]
//!
//! A [`FitRequest`] carries raw caller input. It is normalized (run count
//! defaulted and clamped, samples ordered by duration, body weight dropped
//! when unusable) before being handed to the model, and the fitted model is
//! summarised into a serializable [`FitReport`].

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::curve::display_curve;
use crate::error::{CpError, Result};
use crate::model::{CriticalPowerModel, OutlierSummary, DEFAULT_RUN_COUNT};
use crate::models::{CurvePoint, FittedParameters, Sample};
use crate::vo2max::Vo2MaxEstimate;
use crate::zones::{TrainingZones, ZoneRatios};

/// Caller input for one fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRequest {
    #[serde(rename = "pt")]
    pub samples: Vec<Sample>,

    /// Annealing attempts; zero or negative selects the default
    #[serde(rename = "runtimes", default)]
    pub run_count: i64,

    /// Run the filters and refinement; `None` follows the configuration
    #[serde(default)]
    pub outlier_detect: Option<bool>,

    /// Body mass in kilograms, used for VO2max
    #[serde(default)]
    pub weight: Option<f64>,
}

impl FitRequest {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples,
            run_count: 0,
            outlier_detect: None,
            weight: None,
        }
    }

    /// Apply defaults and limits.
    ///
    /// `run_count ≤ 0` becomes `default_run_count` (or [`DEFAULT_RUN_COUNT`]
    /// when that is zero), anything above `run_count_max` is clamped, samples
    /// are stably sorted by time and a non-positive weight is discarded.
    pub fn normalize(mut self, default_run_count: usize, run_count_max: usize) -> Self {
        let max = i64::try_from(run_count_max.max(1)).unwrap_or(i64::MAX);
        let requested = if self.run_count <= 0 {
            let default = if default_run_count == 0 {
                DEFAULT_RUN_COUNT
            } else {
                default_run_count
            };
            i64::try_from(default).unwrap_or(i64::MAX)
        } else {
            self.run_count
        };
        self.run_count = requested.min(max);

        self.samples.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.weight = self.weight.filter(|w| *w > 0.0);
        self
    }
}

/// Everything derived from a successful fit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitReport {
    pub parameters: FittedParameters,
    pub vo2max: Option<Vo2MaxEstimate>,
    pub training_zones: TrainingZones,
    /// Samples the final fit used, in input order
    pub kept: Vec<Sample>,
    pub outliers: Vec<Sample>,
    pub outlier_summary: OutlierSummary,
    pub curve: Vec<CurvePoint>,
}

impl FitReport {
    /// Summarise a fitted model.
    ///
    /// Returns `NotFitted` when the model has no parameters.
    pub fn from_model(
        model: &CriticalPowerModel,
        weight: Option<f64>,
        ratios: &ZoneRatios,
    ) -> Result<Self> {
        let parameters = *model.parameters().ok_or(CpError::NotFitted)?;
        let vo2max = match weight {
            Some(kg) => Some(model.vo2max(kg)?),
            None => None,
        };

        Ok(Self {
            parameters,
            vo2max,
            training_zones: model.training_zones_with(ratios)?,
            kept: model.kept_samples(),
            outliers: model.outlier_samples(),
            outlier_summary: model.outlier_summary(),
            curve: display_curve(&parameters, model.data()),
        })
    }
}

/// Normalize `request`, fit it under `config` and build the report
#[instrument(skip_all, fields(samples = request.samples.len()))]
pub fn run(request: FitRequest, config: &AppConfig) -> Result<FitReport> {
    let request = request.normalize(config.fitting.run_count, config.fitting.run_count_max);

    let mut model_config = config.model_config(Some(request.run_count as usize));
    model_config.outlier_detection = request
        .outlier_detect
        .unwrap_or(config.fitting.outlier_detection);

    let mut model = CriticalPowerModel::new(model_config);
    model.fit(request.samples)?;

    let report = FitReport::from_model(&model, request.weight, &config.zones)?;
    info!(
        kept = report.kept.len(),
        outliers = report.outlier_summary.count,
        curve_points = report.curve.len(),
        "Report built"
    );
    Ok(report)
}
