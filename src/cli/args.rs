use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::detectors::Contamination;
use crate::models::Season;

#[derive(Parser)]
#[command(name = "weather-anomaly")]
#[command(about = "Synthetic weather generation, cleaning and anomaly detection")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(
        short,
        long,
        global = true,
        help = "Configuration file [default: weather-anomaly.toml if present]"
    )]
    pub config: Option<PathBuf>,
}

/// Options shared by commands that work on a prepared dataset.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DatasetArgs {
    #[arg(
        short,
        long,
        help = "CSV file to analyse instead of the generated dataset"
    )]
    pub input: Option<PathBuf>,

    #[arg(long, help = "Keep rows on or after this date (YYYY-MM-DD)")]
    pub from: Option<NaiveDate>,

    #[arg(long, help = "Keep rows on or before this date (YYYY-MM-DD)")]
    pub to: Option<NaiveDate>,

    #[arg(
        long,
        value_delimiter = ',',
        help = "Keep rows in these seasons (comma separated)"
    )]
    pub season: Vec<Season>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a synthetic daily series and write it as CSV
    Generate {
        #[arg(long, help = "First day [default: from configuration]")]
        start: Option<NaiveDate>,

        #[arg(long, help = "Last day [default: from configuration]")]
        end: Option<NaiveDate>,

        #[arg(short, long, help = "Random seed [default: from configuration]")]
        seed: Option<u64>,

        #[arg(
            short,
            long,
            help = "Output CSV path [default: raw snapshot location]"
        )]
        output: Option<PathBuf>,
    },

    /// Clean a table (clip ranges, derive month and season)
    Clean {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[arg(short, long, help = "Output CSV path for the cleaned table")]
        output: Option<PathBuf>,
    },

    /// Run isolation-forest anomaly detection
    Detect {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[arg(long, help = "Expected outlier share: 'auto' or a fraction in (0, 0.5]")]
        contamination: Option<Contamination>,

        #[arg(short, long, help = "Detector seed [default: from configuration]")]
        seed: Option<u64>,

        #[arg(long, help = "Print the detection info as JSON")]
        json: bool,

        #[arg(short, long, help = "Write the annotated table to this CSV path")]
        output: Option<PathBuf>,

        #[arg(long, default_value = "10", help = "Anomalous rows to list")]
        show: usize,
    },

    /// Print the full text report
    Report {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[arg(short, long, help = "Detector seed [default: from configuration]")]
        seed: Option<u64>,

        #[arg(short, long, help = "Also write the report to this file")]
        output: Option<PathBuf>,
    },

    /// Descriptive statistics, correlations and seasonal aggregates
    Stats {
        #[command(flatten)]
        dataset: DatasetArgs,
    },
}
