use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

use critpower::analysis::{self, FitReport, FitRequest};
use critpower::import::{self, SampleFormat};
use critpower::{init_logging, AppConfig, LogFormat, LogLevel};

/// critpower - Critical Power Curve Fitting CLI
///
/// Fits the three-parameter critical power model to maximal-effort
/// power/duration data and derives training zones and a VO2max estimate.
#[derive(Parser)]
#[command(name = "critpower")]
#[command(version)]
#[command(about = "Three-parameter critical power curve fitting", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Console log format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the model to a file of time/power samples
    Fit {
        /// Input file path (CSV or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// File format (auto-detect if not specified)
        #[arg(short = 'f', long, value_enum)]
        format: Option<SampleFormat>,

        /// Annealing attempts (default from config)
        #[arg(short, long)]
        runs: Option<i64>,

        /// Fit on every sample without filtering or refinement
        #[arg(long)]
        no_outlier_detection: bool,

        /// Body mass in kg, enables the VO2max estimate
        #[arg(short, long)]
        weight: Option<f64>,

        /// Seed for a reproducible fit
        #[arg(long)]
        seed: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Include the predicted curve in the output
        #[arg(long)]
        curve: bool,
    },

    /// Configure application settings
    Config {
        /// Write a default configuration file
        #[arg(long, conflicts_with = "show")]
        init: bool,

        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Tabled)]
struct ZoneRow {
    #[tabled(rename = "Zone")]
    name: &'static str,
    #[tabled(rename = "Min (W)")]
    min: String,
    #[tabled(rename = "Max (W)")]
    max: String,
}

#[derive(Tabled)]
struct PointRow {
    #[tabled(rename = "Time (s)")]
    time: String,
    #[tabled(rename = "Power (W)")]
    power: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone();
    let mut config = match &config_path {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AppConfig::load_or_default().context("failed to load default config")?,
    };

    config.logging.level = LogLevel::from_verbosity(config.logging.level, cli.verbose);
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Fit {
            input,
            format,
            runs,
            no_outlier_detection,
            weight,
            seed,
            json,
            curve,
        } => {
            if seed.is_some() {
                config.fitting.seed = seed;
            }

            let samples = import::load_samples(&input, format)
                .with_context(|| format!("failed to read samples from {}", input.display()))?;

            // Unset options fall back to the [fitting] section during normalization
            let request = FitRequest {
                samples,
                run_count: runs.unwrap_or(0),
                outlier_detect: no_outlier_detection.then_some(false),
                weight,
            };

            let report = match analysis::run(request, &config) {
                Ok(report) => report,
                Err(err) => {
                    if err.severity().to_tracing_level() == tracing::Level::ERROR {
                        tracing::error!(%err, retryable = err.is_retryable(), "Fit failed");
                    } else {
                        tracing::warn!(%err, retryable = err.is_retryable(), "Fit failed");
                    }
                    eprintln!("{} {}", "✗".red().bold(), err.user_message());
                    std::process::exit(1);
                }
            };

            if json {
                let mut value = serde_json::to_value(&report)?;
                if !curve {
                    if let Some(obj) = value.as_object_mut() {
                        obj.remove("curve");
                    }
                }
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print_report(&report, curve);
            }
        }

        Commands::Config { init, show } => {
            let path = config_path.unwrap_or_else(AppConfig::default_config_path);
            if init {
                if path.exists() {
                    anyhow::bail!("config file already exists: {}", path.display());
                }
                AppConfig::default().save_to_file(&path)?;
                println!("{} {}", "✓ Wrote default configuration to".green(), path.display());
            } else if show {
                println!("{}", format!("# {}", path.display()).dimmed());
                println!("{}", toml::to_string_pretty(&config)?);
            } else {
                println!("Configuration file: {}", path.display());
                println!("Use --init to create it or --show to print the effective settings.");
            }
        }
    }

    Ok(())
}

fn print_report(report: &FitReport, include_curve: bool) {
    let p = &report.parameters;

    println!("{}", "Critical Power Model".green().bold());
    println!("  CP:    {:>8.1} W", p.cp);
    println!("  W':    {:>8.0} J", p.w_prime);
    println!("  Tau:   {:>8.2} s", p.tau);
    println!("  Pmax:  {:>8.1} W", p.pmax);
    println!("  RMSE:  {:>8.2} W", p.rmse);

    if let Some(vo2) = &report.vo2max {
        println!(
            "  VO2max: {:.1} ml/kg/min (5 min power {:.0} W at {:.1} kg)",
            vo2.vo2max_ml_kg_min, vo2.five_minute_power, vo2.body_mass_kg
        );
    }

    let summary = &report.outlier_summary;
    let line = format!(
        "  Outliers: {} of {} ({:.1}%)",
        summary.count, summary.total, summary.percent
    );
    if summary.count > 0 {
        println!("{}", line.yellow());
    } else {
        println!("{}", line);
    }

    println!();
    println!("{}", "Training Zones".blue().bold());
    let rows: Vec<ZoneRow> = report
        .training_zones
        .named()
        .into_iter()
        .map(|(name, zone)| ZoneRow {
            name,
            min: format!("{:.0}", zone.min),
            max: format!("{:.0}", zone.max),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    if !report.outliers.is_empty() {
        println!();
        println!("{}", "Flagged Samples".yellow().bold());
        println!("{}", Table::new(point_rows(&report.outliers)).with(Style::rounded()));
    }

    if include_curve {
        println!();
        println!("{}", "Predicted Curve".blue().bold());
        let rows: Vec<PointRow> = report
            .curve
            .iter()
            .map(|pt| PointRow {
                time: format!("{}", pt.time),
                power: format!("{:.1}", pt.power),
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }
}

fn point_rows(samples: &[critpower::Sample]) -> Vec<PointRow> {
    samples
        .iter()
        .map(|s| PointRow {
            time: format!("{}", s.time),
            power: format!("{:.1}", s.power),
        })
        .collect()
}
