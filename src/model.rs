//! Three-parameter critical power model
//!
//! `P(t) = (W' + CP·(t + τ)) / (t + τ)`, with `Pmax = CP + W'/τ`.
//!
//! [`CriticalPowerModel::fit`] owns the whole fitting session: it binds the
//! dataset, sanitizes it, fits on the surviving samples and then alternates
//! outlier detection with refits for a fixed number of rounds. Outlier marks
//! accumulate for the whole session and always refer to input positions.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::curve::CurveIter;
use crate::error::{CpError, Result};
use crate::filter::{DataFilterPipeline, FilterConfig};
use crate::fitter::ModelFitter;
use crate::models::{FittedParameters, OutlierSet, Sample};
use crate::optimizer::AnnealingSchedule;
use crate::outliers::OutlierDetector;
use crate::vo2max::{Vo2MaxAnalyzer, Vo2MaxEstimate};
use crate::zones::{TrainingZones, ZoneCalculator, ZoneRatios};

/// Default number of annealing attempts per fit
pub const DEFAULT_RUN_COUNT: usize = 10_000;

/// Detection-and-refit rounds after the initial fit
pub const REFINE_ROUNDS: usize = 10;

/// IQR multiplier used by the refine loop
pub const RESIDUAL_THRESHOLD: f64 = 3.0;

/// Model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Annealing attempts per fit (at least 1)
    pub run_count: usize,

    /// Run the filter pipeline and the refine loop
    pub outlier_detection: bool,

    /// Limits for the structural validity pass
    pub filter: FilterConfig,

    /// Annealing schedule shared by every attempt
    pub annealing: AnnealingSchedule,

    /// Seed for reproducible fits
    pub seed: Option<u64>,

    /// Worker count override (defaults to one per CPU)
    pub workers: Option<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            run_count: DEFAULT_RUN_COUNT,
            outlier_detection: true,
            filter: FilterConfig::default(),
            annealing: AnnealingSchedule::default(),
            seed: None,
            workers: None,
        }
    }
}

impl ModelConfig {
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder::default()
    }
}

/// Builder for [`ModelConfig`]
#[derive(Debug, Clone, Default)]
pub struct ModelConfigBuilder {
    config: ModelConfig,
}

impl ModelConfigBuilder {
    /// Number of annealing attempts; zero falls back to the default
    pub fn run_count(mut self, run_count: usize) -> Self {
        self.config.run_count = if run_count == 0 {
            DEFAULT_RUN_COUNT
        } else {
            run_count
        };
        self
    }

    pub fn outlier_detection(mut self, enabled: bool) -> Self {
        self.config.outlier_detection = enabled;
        self
    }

    pub fn filter(mut self, filter: FilterConfig) -> Self {
        self.config.filter = filter;
        self
    }

    pub fn annealing(mut self, schedule: AnnealingSchedule) -> Self {
        self.config.annealing = schedule;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = Some(workers);
        self
    }

    pub fn build(self) -> ModelConfig {
        self.config
    }
}

/// Outlier totals for reporting
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutlierSummary {
    pub count: usize,
    pub total: usize,
    pub percent: f64,
}

/// Critical power model and its fitting session state
#[derive(Debug, Clone)]
pub struct CriticalPowerModel {
    config: ModelConfig,
    data: Vec<Sample>,
    outliers: OutlierSet,
    params: Option<FittedParameters>,
}

impl Default for CriticalPowerModel {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

impl CriticalPowerModel {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config: ModelConfig {
                run_count: config.run_count.max(1),
                ..config
            },
            data: Vec::new(),
            outliers: OutlierSet::new(),
            params: None,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Dataset bound by the last `fit` call
    pub fn data(&self) -> &[Sample] {
        &self.data
    }

    /// Indices of the bound dataset flagged during the last session
    pub fn outliers(&self) -> &OutlierSet {
        &self.outliers
    }

    /// Parameters of the last successful fit
    pub fn parameters(&self) -> Option<&FittedParameters> {
        self.params.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    /// Samples that were flagged as outliers, in input order
    pub fn outlier_samples(&self) -> Vec<Sample> {
        self.outliers.iter().map(|&i| self.data[i]).collect()
    }

    /// Samples the final fit was computed on, in input order
    pub fn kept_samples(&self) -> Vec<Sample> {
        self.surviving()
    }

    pub fn outlier_summary(&self) -> OutlierSummary {
        let total = self.data.len();
        let count = self.outliers.len();
        let percent = if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        };
        OutlierSummary {
            count,
            total,
            percent,
        }
    }

    /// Fit the model to `data`.
    ///
    /// Starts a new session: the dataset is bound and the outlier set and
    /// parameters from any previous session are discarded. On error the model
    /// has no parameters.
    #[instrument(skip_all, fields(samples = data.len(), runs = self.config.run_count))]
    pub fn fit(&mut self, data: Vec<Sample>) -> Result<&FittedParameters> {
        self.data = data;
        self.outliers.clear();
        self.params = None;

        info!(
            outlier_detection = self.config.outlier_detection,
            "Fitting critical power model"
        );

        match self.run_session() {
            Ok(params) => {
                info!(
                    cp = params.cp,
                    w_prime = params.w_prime,
                    tau = params.tau,
                    pmax = params.pmax,
                    rmse = params.rmse,
                    outliers = self.outliers.len(),
                    "Model fitted"
                );
                Ok(&*self.params.insert(params))
            }
            Err(err) => {
                warn!(%err, "Model fit failed");
                Err(err)
            }
        }
    }

    fn run_session(&mut self) -> Result<FittedParameters> {
        let fitter = self.fitter();

        if self.config.outlier_detection {
            DataFilterPipeline::new(self.config.filter.clone()).run(&self.data, &mut self.outliers);
        }

        let mut params = fitter.fit(&self.surviving())?;

        if self.config.outlier_detection {
            for round in 1..=REFINE_ROUNDS {
                let residual = OutlierDetector::residual_iqr(
                    &self.data,
                    &params,
                    RESIDUAL_THRESHOLD,
                    &mut self.outliers,
                );
                let non_maximal =
                    OutlierDetector::non_maximal_effort(&self.data, &params, &mut self.outliers);

                params = fitter.fit(&self.surviving())?;
                debug!(
                    round,
                    residual,
                    non_maximal,
                    cp = params.cp,
                    w_prime = params.w_prime,
                    tau = params.tau,
                    "Refine round complete"
                );
            }
        }

        Ok(params)
    }

    fn fitter(&self) -> ModelFitter {
        let fitter = ModelFitter::new(self.config.run_count)
            .with_schedule(self.config.annealing.clone())
            .with_seed(self.config.seed);
        match self.config.workers {
            Some(workers) => fitter.with_workers(workers),
            None => fitter,
        }
    }

    fn surviving(&self) -> Vec<Sample> {
        self.data
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.outliers.contains(i))
            .map(|(_, s)| *s)
            .collect()
    }

    fn fitted(&self) -> Result<&FittedParameters> {
        self.params.as_ref().ok_or(CpError::NotFitted)
    }

    /// Maximal power sustainable for `time` seconds; `time ≤ 0` gives Pmax
    pub fn predict_power(&self, time: f64) -> Result<f64> {
        Ok(self.fitted()?.power_at(time))
    }

    /// Longest time `power` can be sustained.
    ///
    /// Powers at or below CP are sustainable indefinitely. Powers above Pmax
    /// are outside the model.
    pub fn predict_time(&self, power: f64) -> Result<f64> {
        let p = self.fitted()?;
        if power <= p.cp {
            return Ok(f64::INFINITY);
        }
        if power > p.pmax {
            return Err(CpError::Domain {
                power,
                pmax: p.pmax,
            });
        }
        Ok(p.w_prime / (power - p.cp) - p.tau)
    }

    /// Per-second predictions over `from..=to` seconds
    pub fn predict_curve(&self, from: u32, to: u32) -> Result<CurveIter> {
        Ok(CurveIter::new(*self.fitted()?, from, to))
    }

    /// VO2max (ml/kg/min) from the predicted five-minute power
    pub fn vo2max(&self, body_mass_kg: f64) -> Result<Vo2MaxEstimate> {
        Vo2MaxAnalyzer::estimate_from_curve(self.fitted()?, body_mass_kg)
    }

    /// Training zones from the default ratio table
    pub fn training_zones(&self) -> Result<TrainingZones> {
        self.training_zones_with(&ZoneRatios::default())
    }

    pub fn training_zones_with(&self, ratios: &ZoneRatios) -> Result<TrainingZones> {
        Ok(ZoneCalculator::calculate(self.fitted()?, ratios))
    }
}
