use std::collections::BTreeMap;
use tracing::{debug, info};
use validator::Validate;

use crate::error::{ProcessingError, Result};
use crate::models::{Column, WeatherTable};
use crate::utils::constants::{
    MAX_VALID_HUMIDITY, MAX_VALID_TEMP, MIN_VALID_HUMIDITY, MIN_VALID_PRECIPITATION,
    MIN_VALID_TEMP,
};

/// Columns the cleaner refuses to work without.
pub const REQUIRED_COLUMNS: [Column; 4] = [
    Column::Date,
    Column::Temperature,
    Column::Humidity,
    Column::Precipitation,
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleaningReport {
    pub total_records: usize,
    pub temperature_clipped: usize,
    pub humidity_clipped: usize,
    pub precipitation_clipped: usize,
    pub missing_values: BTreeMap<Column, usize>,
}

impl CleaningReport {
    pub fn total_clipped(&self) -> usize {
        self.temperature_clipped + self.humidity_clipped + self.precipitation_clipped
    }

    pub fn total_missing(&self) -> usize {
        self.missing_values.values().sum()
    }

    pub fn summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("=== Cleaning Report ===\n");
        summary.push_str(&format!("Total Records: {}\n", self.total_records));
        summary.push_str(&format!(
            "Clipped Values: {} (temperature {}, humidity {}, precipitation {})\n",
            self.total_clipped(),
            self.temperature_clipped,
            self.humidity_clipped,
            self.precipitation_clipped
        ));
        summary.push_str(&format!("Missing Values: {}\n", self.total_missing()));

        for (column, count) in self.missing_values.iter().filter(|(_, n)| **n > 0) {
            summary.push_str(&format!("  - {}: {}\n", column, count));
        }

        summary
    }
}

/// Clips physical fields to their valid ranges and derives `month`/`season`.
///
/// Cleaning never mutates its input and is idempotent. Missing values stay
/// missing; imputation is the detector's job.
///
/// [`clean`](Self::clean) insists on [`REQUIRED_COLUMNS`].
/// [`clean_present`](Self::clean_present) only needs `date` and clips
/// whichever physical columns the table has, leaving absent features for the
/// detector to report.
pub struct DataCleaner;

impl DataCleaner {
    pub fn new() -> Self {
        Self
    }

    pub fn clean(&self, table: &WeatherTable) -> Result<(WeatherTable, CleaningReport)> {
        for column in REQUIRED_COLUMNS {
            if !table.has_column(column) {
                return Err(ProcessingError::MissingColumn(column.to_string()));
            }
        }
        self.clean_present(table)
    }

    pub fn clean_present(&self, table: &WeatherTable) -> Result<(WeatherTable, CleaningReport)> {
        let absent: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !table.has_column(**c))
            .map(|c| c.name())
            .collect();
        if !absent.is_empty() {
            debug!(?absent, "cleaning without some physical columns");
        }

        let mut cleaned = table.clone();
        let mut report = CleaningReport {
            total_records: cleaned.len(),
            ..Default::default()
        };

        for record in cleaned.records_mut() {
            if clip(&mut record.temperature, MIN_VALID_TEMP, MAX_VALID_TEMP) {
                report.temperature_clipped += 1;
            }
            if clip(&mut record.humidity, MIN_VALID_HUMIDITY, MAX_VALID_HUMIDITY) {
                report.humidity_clipped += 1;
            }
            if clip(
                &mut record.precipitation,
                MIN_VALID_PRECIPITATION,
                f64::INFINITY,
            ) {
                report.precipitation_clipped += 1;
            }

            record.derive_calendar_fields();
            record.validate()?;
        }

        cleaned.add_column(Column::Month);
        cleaned.add_column(Column::Season);

        for column in cleaned.columns().iter().copied() {
            let missing = cleaned
                .iter()
                .filter(|r| r.cell(column).is_empty())
                .count();
            report.missing_values.insert(column, missing);
        }

        debug!(
            clipped = report.total_clipped(),
            missing = report.total_missing(),
            "cleaning details"
        );
        info!(rows = cleaned.len(), "cleaned weather table");

        Ok((cleaned, report))
    }
}

impl Default for DataCleaner {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp a present value into `[min, max]`, returning whether it changed.
fn clip(value: &mut Option<f64>, min: f64, max: f64) -> bool {
    match value {
        Some(v) if *v < min => {
            *v = min;
            true
        }
        Some(v) if *v > max => {
            *v = max;
            true
        }
        _ => false,
    }
}
