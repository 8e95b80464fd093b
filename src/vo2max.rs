//! VO2max estimation from the fitted power-duration curve
//!
//! Uses the five-minute power prediction, following "Five-Minute Power-Based
//! Test to Predict Maximal Oxygen Consumption in Road Cycling" (Sitko et al.,
//! 2021): VO2max (ml/kg/min) = 16.6 + 8.87 × P5min / body mass.

use serde::{Deserialize, Serialize};

use crate::error::{CpError, Result};
use crate::models::FittedParameters;

/// Duration of the reference effort in seconds
pub const REFERENCE_DURATION: f64 = 300.0;

const INTERCEPT: f64 = 16.6;
const SLOPE: f64 = 8.87;

/// VO2max estimate with the inputs that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vo2MaxEstimate {
    /// VO2max in ml/kg/min
    pub vo2max_ml_kg_min: f64,
    /// Predicted five-minute power in watts
    pub five_minute_power: f64,
    /// Body mass in kilograms
    pub body_mass_kg: f64,
}

/// VO2max analyzer
pub struct Vo2MaxAnalyzer;

impl Vo2MaxAnalyzer {
    /// Estimate VO2max from a five-minute power and body mass
    ///
    /// # Arguments
    /// * `five_minute_power` - Maximal power sustainable for five minutes (W)
    /// * `body_mass_kg` - Athlete body mass in kilograms
    pub fn estimate_from_five_minute_power(
        five_minute_power: f64,
        body_mass_kg: f64,
    ) -> Result<Vo2MaxEstimate> {
        if !(body_mass_kg > 0.0) {
            return Err(CpError::InvalidParameter {
                parameter: "body_mass_kg".to_string(),
                value: body_mass_kg.to_string(),
            });
        }
        if !(five_minute_power > 0.0) {
            return Err(CpError::InvalidParameter {
                parameter: "five_minute_power".to_string(),
                value: five_minute_power.to_string(),
            });
        }

        Ok(Vo2MaxEstimate {
            vo2max_ml_kg_min: INTERCEPT + SLOPE * (five_minute_power / body_mass_kg),
            five_minute_power,
            body_mass_kg,
        })
    }

    /// Estimate VO2max from fitted curve parameters
    pub fn estimate_from_curve(
        params: &FittedParameters,
        body_mass_kg: f64,
    ) -> Result<Vo2MaxEstimate> {
        Self::estimate_from_five_minute_power(params.power_at(REFERENCE_DURATION), body_mass_kg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_minute_power_estimate() {
        // 300 W at 75 kg = 4 W/kg -> 16.6 + 35.48
        let estimate = Vo2MaxAnalyzer::estimate_from_five_minute_power(300.0, 75.0).unwrap();
        assert!((estimate.vo2max_ml_kg_min - 52.08).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_from_curve_uses_five_minutes() {
        // P(300) = (18000 + 250 * 310) / 310
        let params = FittedParameters::new(250.0, 18000.0, 10.0, 0.0);
        let estimate = Vo2MaxAnalyzer::estimate_from_curve(&params, 70.0).unwrap();

        let expected_power = (18000.0 + 250.0 * 310.0) / 310.0;
        assert!((estimate.five_minute_power - expected_power).abs() < 1e-9);
        assert!((estimate.vo2max_ml_kg_min - (16.6 + 8.87 * expected_power / 70.0)).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(Vo2MaxAnalyzer::estimate_from_five_minute_power(300.0, 0.0).is_err());
        assert!(Vo2MaxAnalyzer::estimate_from_five_minute_power(300.0, -70.0).is_err());
        assert!(Vo2MaxAnalyzer::estimate_from_five_minute_power(0.0, 70.0).is_err());
        assert!(Vo2MaxAnalyzer::estimate_from_five_minute_power(300.0, f64::NAN).is_err());
    }
}
