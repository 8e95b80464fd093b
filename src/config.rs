use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CpError, Result};
use crate::filter::FilterConfig;
use crate::logging::LogConfig;
use crate::model::{ModelConfig, DEFAULT_RUN_COUNT};
use crate::optimizer::AnnealingSchedule;
use crate::zones::ZoneRatios;

/// Upper bound applied to caller-supplied run counts
pub const DEFAULT_RUN_COUNT_MAX: usize = 1_000_000;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fitting behaviour
    pub fitting: FittingSettings,

    /// Structural filter limits
    pub filter: FilterConfig,

    /// Annealing schedule
    pub annealing: AnnealingSchedule,

    /// Training zone ratio table
    pub zones: ZoneRatios,

    /// Logging output
    pub logging: LogConfig,
}

/// Fitting settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FittingSettings {
    /// Annealing attempts per fit when the caller does not choose
    pub run_count: usize,

    /// Largest run count a caller may request
    pub run_count_max: usize,

    /// Enable the filter pipeline and refine loop
    pub outlier_detection: bool,

    /// Fixed seed for reproducible fits
    pub seed: Option<u64>,

    /// Worker threads (defaults to one per CPU)
    pub workers: Option<usize>,
}

impl Default for FittingSettings {
    fn default() -> Self {
        Self {
            run_count: DEFAULT_RUN_COUNT,
            run_count_max: DEFAULT_RUN_COUNT_MAX,
            outlier_detection: true,
            seed: None,
            workers: None,
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Default configuration file path (`~/.critpower/config.toml`)
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".critpower")
            .join("config.toml")
    }

    /// Load the default file, falling back to defaults when it is missing
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject settings the fitter cannot work with
    pub fn validate(&self) -> Result<()> {
        let fitting = &self.fitting;
        if fitting.run_count == 0 {
            return Err(CpError::Configuration("fitting.run_count must be positive".to_string()));
        }
        if fitting.run_count_max < fitting.run_count {
            return Err(CpError::Configuration(format!(
                "fitting.run_count_max ({}) is below fitting.run_count ({})",
                fitting.run_count_max, fitting.run_count
            )));
        }
        if fitting.workers == Some(0) {
            return Err(CpError::Configuration("fitting.workers must be positive".to_string()));
        }
        if !(self.filter.max_power > 0.0) {
            return Err(CpError::Configuration("filter.max_power must be positive".to_string()));
        }
        if self.filter.max_time.is_some_and(|t| !(t > 0.0)) {
            return Err(CpError::Configuration("filter.max_time must be positive".to_string()));
        }

        let schedule = &self.annealing;
        if !(schedule.initial_temperature > schedule.final_temperature)
            || !(schedule.final_temperature > 0.0)
        {
            return Err(CpError::Configuration(
                "annealing temperatures must satisfy initial > final > 0".to_string(),
            ));
        }
        if !(schedule.cooling_rate > 0.0 && schedule.cooling_rate < 1.0) {
            return Err(CpError::Configuration(
                "annealing.cooling_rate must lie in (0, 1)".to_string(),
            ));
        }

        self.zones.validate()
    }

    /// Model configuration for a fit with an optional caller run count
    pub fn model_config(&self, run_count: Option<usize>) -> ModelConfig {
        let run_count = run_count
            .filter(|&n| n > 0)
            .unwrap_or(self.fitting.run_count)
            .min(self.fitting.run_count_max);

        ModelConfig {
            run_count,
            outlier_detection: self.fitting.outlier_detection,
            filter: self.filter.clone(),
            annealing: self.annealing.clone(),
            seed: self.fitting.seed,
            workers: self.fitting.workers,
        }
    }
}
