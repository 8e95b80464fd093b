//! Unified error hierarchy for critpower
//!
//! Provides a single error type for fitting, prediction, configuration and
//! input loading, with severity levels that map onto the tracing system.

use thiserror::Error;

/// Top-level error type for all critpower operations
#[derive(Debug, Error)]
pub enum CpError {
    /// Too few usable samples remain to fit the three-parameter model
    #[error("Insufficient data: at least {required} samples required, {available} available")]
    InsufficientData { required: usize, available: usize },

    /// Every optimizer attempt failed or diverged
    #[error("Model fitting failed: {0}")]
    OptimizationFailure(String),

    /// Requested power lies above the modelled maximal power
    #[error("Power {power:.1} W exceeds modelled maximal power {pmax:.1} W")]
    Domain { power: f64, pmax: f64 },

    /// An accessor was used before a successful fit
    #[error("Model has not been fitted")]
    NotFitted,

    /// Invalid argument passed to a calculation
    #[error("Invalid parameter: {parameter}={value}")]
    InvalidParameter { parameter: String, value: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Sample input could not be interpreted
    #[error("Import error in {format}: {reason}")]
    Import { format: String, reason: String },

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// CSV parsing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for critpower operations
pub type Result<T> = std::result::Result<T, CpError>;

impl CpError {
    /// Check if a fit may succeed when simply retried
    ///
    /// The optimizer is stochastic, so a failed search can succeed on another
    /// draw. Everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CpError::OptimizationFailure(_) | CpError::Io(_))
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CpError::Domain { .. } => ErrorSeverity::Info,
            CpError::InsufficientData { .. } => ErrorSeverity::Warning,
            CpError::InvalidParameter { .. } => ErrorSeverity::Warning,
            CpError::NotFitted => ErrorSeverity::Warning,
            CpError::Import { .. } | CpError::Csv(_) | CpError::Json(_) => ErrorSeverity::Warning,
            CpError::ThreadPool(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            CpError::InsufficientData { required, available } => format!(
                "Not enough valid efforts to fit the model: {} usable, {} needed. \
                 Add more time/power pairs or disable outlier detection.",
                available, required
            ),
            CpError::OptimizationFailure(_) => {
                "The curve fit did not converge. Try again or increase the run count.".to_string()
            }
            CpError::Domain { pmax, .. } => {
                format!("That power cannot be held; the model tops out at {:.0} W.", pmax)
            }
            CpError::Configuration(reason) => format!("Invalid configuration: {}", reason),
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = CpError::InsufficientData {
            required: 3,
            available: 1,
        };
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = CpError::ThreadPool("no threads".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.severity().to_tracing_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_error_retryable() {
        let err = CpError::OptimizationFailure("all attempts diverged".to_string());
        assert!(err.is_retryable());

        let err = CpError::Domain {
            power: 2000.0,
            pmax: 1500.0,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_user_messages() {
        let err = CpError::InsufficientData {
            required: 3,
            available: 2,
        };
        assert!(err.user_message().contains("2 usable"));

        let err = CpError::Domain {
            power: 2000.0,
            pmax: 1500.0,
        };
        assert!(err.user_message().contains("1500"));
    }
}
