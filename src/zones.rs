use serde::{Deserialize, Serialize};

use crate::error::{CpError, Result};
use crate::models::FittedParameters;

/// A power band in watts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub min: f64,
    pub max: f64,
}

/// Lower and upper ratio of a band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Ratio table used to derive training zones from a fitted curve.
///
/// Aerobic bands are fractions of CP. The anaerobic band runs from a fraction
/// of CP to a fraction of Pmax, and the neuromuscular band is a fraction of
/// Pmax at both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneRatios {
    pub recovery: Band,
    pub endurance: Band,
    pub tempo: Band,
    pub threshold: Band,
    pub vo2max: Band,
    /// `min` is a CP ratio, `max` a Pmax ratio
    pub anaerobic: Band,
    pub neuromuscular: Band,
}

impl Default for ZoneRatios {
    fn default() -> Self {
        Self {
            recovery: Band::new(0.0, 0.6),
            endurance: Band::new(0.6, 0.9),
            tempo: Band::new(0.9, 0.95),
            threshold: Band::new(0.95, 1.05),
            vo2max: Band::new(1.05, 1.3),
            anaerobic: Band::new(1.3, 0.8),
            neuromuscular: Band::new(0.8, 1.0),
        }
    }
}

impl ZoneRatios {
    /// Check that every ratio is non-negative and the CP bands are ordered
    /// and contiguous.
    pub fn validate(&self) -> Result<()> {
        let cp_bands = [
            ("recovery", self.recovery),
            ("endurance", self.endurance),
            ("tempo", self.tempo),
            ("threshold", self.threshold),
            ("vo2max", self.vo2max),
        ];

        for (name, band) in cp_bands.iter().chain([("neuromuscular", self.neuromuscular)].iter()) {
            if band.min < 0.0 || band.max < band.min {
                return Err(CpError::Configuration(format!(
                    "zone '{}' has invalid ratios {}..{}",
                    name, band.min, band.max
                )));
            }
        }

        for pair in cp_bands.windows(2) {
            let (lower_name, lower) = pair[0];
            let (upper_name, upper) = pair[1];
            if (lower.max - upper.min).abs() > f64::EPSILON {
                return Err(CpError::Configuration(format!(
                    "zones '{}' and '{}' are not contiguous",
                    lower_name, upper_name
                )));
            }
        }

        if self.anaerobic.min < 0.0 || self.anaerobic.max < 0.0 {
            return Err(CpError::Configuration(
                "zone 'anaerobic' has negative ratios".to_string(),
            ));
        }
        Ok(())
    }
}

/// Training zones derived from CP and Pmax
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingZones {
    pub recovery_zone: Zone,
    pub endurance_zone: Zone,
    pub tempo_zone: Zone,
    pub threshold_zone: Zone,
    pub vo2max_zone: Zone,
    pub anaerobic_zone: Zone,
    pub neuromuscular_zone: Zone,
}

impl TrainingZones {
    /// Zones in ascending intensity with their display names
    pub fn named(&self) -> [(&'static str, Zone); 7] {
        [
            ("Recovery", self.recovery_zone),
            ("Endurance", self.endurance_zone),
            ("Tempo", self.tempo_zone),
            ("Threshold", self.threshold_zone),
            ("VO2max", self.vo2max_zone),
            ("Anaerobic", self.anaerobic_zone),
            ("Neuromuscular", self.neuromuscular_zone),
        ]
    }
}

/// Zone calculation utilities
pub struct ZoneCalculator;

impl ZoneCalculator {
    /// Calculate power zones from fitted parameters
    ///
    /// Default bands:
    /// - Recovery: 0-60% CP
    /// - Endurance: 60-90% CP
    /// - Tempo: 90-95% CP
    /// - Threshold: 95-105% CP
    /// - VO2max: 105-130% CP
    /// - Anaerobic: 130% CP to 80% Pmax
    /// - Neuromuscular: 80-100% Pmax
    pub fn calculate(params: &FittedParameters, ratios: &ZoneRatios) -> TrainingZones {
        let of_cp = |band: Band| Zone {
            min: band.min * params.cp,
            max: band.max * params.cp,
        };

        TrainingZones {
            recovery_zone: of_cp(ratios.recovery),
            endurance_zone: of_cp(ratios.endurance),
            tempo_zone: of_cp(ratios.tempo),
            threshold_zone: of_cp(ratios.threshold),
            vo2max_zone: of_cp(ratios.vo2max),
            anaerobic_zone: Zone {
                min: ratios.anaerobic.min * params.cp,
                max: ratios.anaerobic.max * params.pmax,
            },
            neuromuscular_zone: Zone {
                min: ratios.neuromuscular.min * params.pmax,
                max: ratios.neuromuscular.max * params.pmax,
            },
        }
    }
}
