// Library interface for critpower modules
// This allows integration tests to access the core functionality

pub mod analysis;
pub mod config;
pub mod curve;
pub mod error;
pub mod filter;
pub mod fitter;
pub mod import;
pub mod logging;
pub mod model;
pub mod models;
pub mod optimizer;
pub mod outliers;
pub mod vo2max;
pub mod zones;

// Re-export commonly used types for convenience
pub use analysis::{FitReport, FitRequest};
pub use config::AppConfig;
pub use error::{CpError, ErrorSeverity, Result};
pub use filter::{DataFilterPipeline, FilterConfig, FilterReport};
pub use fitter::ModelFitter;
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use model::{CriticalPowerModel, ModelConfig, ModelConfigBuilder, OutlierSummary};
pub use models::*;
pub use outliers::OutlierDetector;
pub use vo2max::{Vo2MaxAnalyzer, Vo2MaxEstimate};
pub use zones::{TrainingZones, Zone, ZoneCalculator, ZoneRatios};
