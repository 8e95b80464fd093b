//! Loading power-duration samples from files
//!
//! CSV files need a time column and a power column; common header spellings
//! are recognised. JSON input is either a bare array of `{time, power}`
//! objects or a request object carrying the array under `pt`.

use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{CpError, Result};
use crate::models::Sample;

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SampleFormat {
    Csv,
    Json,
}

impl SampleFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(SampleFormat::Csv),
            "json" => Some(SampleFormat::Json),
            _ => None,
        }
    }

    fn importer(self) -> Box<dyn SampleImporter> {
        match self {
            SampleFormat::Csv => Box::new(CsvImporter::new()),
            SampleFormat::Json => Box::new(JsonImporter),
        }
    }
}

/// Trait for reading samples from one file format
pub trait SampleImporter {
    /// Parse samples from a reader
    fn read_samples(&self, reader: &mut dyn Read) -> Result<Vec<Sample>>;

    /// Get the format name for this importer
    fn format_name(&self) -> &'static str;
}

/// Load samples from `path`, detecting the format from the extension when
/// `format` is `None`
pub fn load_samples(path: &Path, format: Option<SampleFormat>) -> Result<Vec<Sample>> {
    let format = format
        .or_else(|| SampleFormat::from_path(path))
        .ok_or_else(|| CpError::Import {
            format: "unknown".to_string(),
            reason: format!("cannot infer format of {}", path.display()),
        })?;

    let importer = format.importer();
    let mut file = fs::File::open(path)?;
    let samples = importer.read_samples(&mut file)?;

    info!(
        path = %path.display(),
        format = importer.format_name(),
        samples = samples.len(),
        "Samples loaded"
    );
    Ok(samples)
}

/// CSV importer with flexible column names
pub struct CsvImporter {
    column_mapping: HashMap<String, &'static str>,
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();
        Self::add_mapping(
            &mut column_mapping,
            "time",
            &["time", "duration", "seconds", "secs", "t", "elapsed"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "power",
            &["power", "watts", "power_watts", "p", "mmp"],
        );
        Self { column_mapping }
    }

    fn add_mapping(
        mapping: &mut HashMap<String, &'static str>,
        standard: &'static str,
        variations: &[&str],
    ) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard);
        }
    }

    fn normalize_column_name(&self, name: &str) -> Option<&'static str> {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");
        self.column_mapping.get(&normalized).copied()
    }

    fn error(reason: impl Into<String>) -> CpError {
        CpError::Import {
            format: "CSV".to_string(),
            reason: reason.into(),
        }
    }
}

impl SampleImporter for CsvImporter {
    fn read_samples(&self, reader: &mut dyn Read) -> Result<Vec<Sample>> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let mut time_col = None;
        let mut power_col = None;
        for (i, header) in headers.iter().enumerate() {
            match self.normalize_column_name(header) {
                Some("time") if time_col.is_none() => time_col = Some(i),
                Some("power") if power_col.is_none() => power_col = Some(i),
                _ => {}
            }
        }
        let (time_col, power_col) = match (time_col, power_col) {
            (Some(t), Some(p)) => (t, p),
            _ => {
                return Err(Self::error(format!(
                    "expected time and power columns, found [{}]",
                    headers.iter().collect::<Vec<_>>().join(", ")
                )))
            }
        };

        let mut samples = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            let field = |col: usize, name: &str| -> Result<f64> {
                let raw = record.get(col).unwrap_or("");
                raw.parse::<f64>().map_err(|_| {
                    Self::error(format!("row {}: invalid {} value '{}'", row + 1, name, raw))
                })
            };
            samples.push(Sample::new(field(time_col, "time")?, field(power_col, "power")?));
        }

        debug!(rows = samples.len(), time_col, power_col, "CSV parsed");
        Ok(samples)
    }

    fn format_name(&self) -> &'static str {
        "CSV"
    }
}

/// JSON importer
pub struct JsonImporter;

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonSamples {
    Bare(Vec<Sample>),
    Request { pt: Vec<Sample> },
}

impl SampleImporter for JsonImporter {
    fn read_samples(&self, reader: &mut dyn Read) -> Result<Vec<Sample>> {
        let parsed: JsonSamples = serde_json::from_reader(reader).map_err(|e| CpError::Import {
            format: "JSON".to_string(),
            reason: e.to_string(),
        })?;
        Ok(match parsed {
            JsonSamples::Bare(samples) => samples,
            JsonSamples::Request { pt } => pt,
        })
    }

    fn format_name(&self) -> &'static str {
        "JSON"
    }
}
