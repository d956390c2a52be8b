use chrono::{Local, NaiveDateTime};
use tracing::{info, warn};

use crate::detectors::{AnomalyDetector, DetectionOutcome, SkipReason};
use crate::models::WeatherTable;
use crate::reports::narrator::{NarrativeContext, Narrator, RuleBasedNarrator};
use crate::reports::summary::summarize;
use crate::utils::constants::{REPORT_EXAMPLE_DATES, REPORT_TIMESTAMP_FORMAT};

pub const NO_DATA_REPORT: &str = "No data available; cannot generate an insights report.";

/// Composes summary, anomaly analysis and insights into one text report.
pub struct ReportBuilder {
    detector: AnomalyDetector,
    narrator: Box<dyn Narrator>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self {
            detector: AnomalyDetector::new(),
            narrator: Box::new(RuleBasedNarrator::new()),
        }
    }

    pub fn with_detector(mut self, detector: AnomalyDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_narrator(mut self, narrator: Box<dyn Narrator>) -> Self {
        self.narrator = narrator;
        self
    }

    pub fn report(&self, table: &WeatherTable, seed: u64) -> String {
        self.report_at(table, seed, Local::now().naive_local())
    }

    /// Same as [`report`](Self::report) with an explicit footer timestamp.
    pub fn report_at(&self, table: &WeatherTable, seed: u64, generated_at: NaiveDateTime) -> String {
        if table.is_empty() {
            return NO_DATA_REPORT.to_string();
        }

        let summary = summarize(table);

        // Detection annotates its input; work on a copy
        let mut scratch = table.clone();
        let outcome = self.detector.clone().with_seed(seed).detect(&mut scratch);

        let mut report = String::from("## Weather Data Analysis Report\n\n");
        report.push_str(&format!("### 1. Data Summary\n{}\n\n", summary));
        report.push_str("### 2. Anomaly Analysis\n");
        report.push_str(&anomaly_section(&outcome));

        let context = NarrativeContext {
            table,
            summary: &summary,
            outcome: &outcome,
        };
        let (heading, narrative) = match self.narrator.narrate(&context) {
            Ok(text) => (self.narrator.heading().to_string(), text),
            Err(e) => {
                warn!(error = %e, "narrator failed, falling back to rule-based insights");
                let fallback = RuleBasedNarrator::new();
                // The rule-based narrator cannot fail
                let text = fallback.narrate(&context).unwrap_or_default();
                (fallback.heading().to_string(), text)
            }
        };
        report.push_str(&format!("\n### 3. {}\n{}", heading, narrative));

        report.push_str(&format!(
            "\n---\nReport generated at: {}",
            generated_at.format(REPORT_TIMESTAMP_FORMAT)
        ));

        info!(
            rows = table.len(),
            anomalies = outcome.anomaly_count(),
            "report generated"
        );
        report
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn anomaly_section(outcome: &DetectionOutcome) -> String {
    let mut section = if outcome.is_completed() {
        format!("Analyzed {} records.\n", outcome.rows_analyzed)
    } else {
        "Analyzed N/A records.\n".to_string()
    };

    if outcome.has_anomalies() {
        section.push_str(&format!(
            "Detected {} potential anomalous weather days, marked by extreme temperature, \
             humidity or precipitation.\n",
            outcome.anomaly_count()
        ));
        section.push_str(&format!(
            "For example, {} may be anomalous.\n",
            outcome.anomaly_dates(REPORT_EXAMPLE_DATES).join(", ")
        ));
        return section;
    }

    match outcome.skip_reason() {
        Some(SkipReason::NotEnoughData) => {
            section.push_str("Not enough data for meaningful anomaly detection.\n")
        }
        Some(SkipReason::ModelError(_)) => section.push_str(&format!(
            "An error occurred during anomaly detection: {}\n",
            outcome.message().unwrap_or_default()
        )),
        Some(SkipReason::EmptyOrMissingFeatures) => section.push_str(
            "Anomaly detection skipped: the data lacks one or more required weather features.\n",
        ),
        None => section.push_str("No significant anomalous weather patterns were detected.\n"),
    }
    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProcessingError, Result};
    use crate::models::{Column, WeatherRecord};
    use chrono::NaiveDate;

    struct FailingNarrator;

    impl Narrator for FailingNarrator {
        fn heading(&self) -> &str {
            "Broken"
        }

        fn narrate(&self, _context: &NarrativeContext<'_>) -> Result<String> {
            Err(ProcessingError::Narrator("unavailable".to_string()))
        }
    }

    struct FixedNarrator;

    impl Narrator for FixedNarrator {
        fn heading(&self) -> &str {
            "External Insights"
        }

        fn narrate(&self, _context: &NarrativeContext<'_>) -> Result<String> {
            Ok("Looks seasonal.\n".to_string())
        }
    }

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap()
    }

    fn table_with_outlier() -> WeatherTable {
        let mut records: Vec<WeatherRecord> = (1..=30)
            .map(|d| {
                let date = NaiveDate::from_ymd_opt(2023, 6, d).unwrap();
                let jitter = (d % 5) as f64 * 0.4;
                WeatherRecord::new(
                    date,
                    Some(18.0 + jitter),
                    Some(60.0 + jitter),
                    Some(0.0),
                    Some(3.0 + jitter),
                )
            })
            .collect();
        records[0].temperature = Some(49.0);
        records[0].precipitation = Some(120.0);
        WeatherTable::from_raw_records(records).unwrap()
    }

    #[test]
    fn test_empty_table_report() {
        assert_eq!(
            ReportBuilder::new().report(&WeatherTable::empty(), 42),
            NO_DATA_REPORT
        );
    }

    #[test]
    fn test_report_sections() {
        let table = table_with_outlier();
        let report = ReportBuilder::new().report_at(&table, 42, timestamp());

        assert!(report.starts_with("## Weather Data Analysis Report\n\n### 1. Data Summary\n"));
        assert!(report.contains(&summarize(&table)));
        assert!(report.contains("### 2. Anomaly Analysis\nAnalyzed 30 records.\n"));
        assert!(report.contains("For example, 2023-06-01"));
        assert!(report.contains("### 3. Insights\n(Insights are generated from built-in rules."));
        assert!(report.ends_with("\n---\nReport generated at: 2024-03-09 14:05:00"));

        // The caller's table is left untouched
        assert!(!table.has_column(Column::AnomalyScore));
    }

    #[test]
    fn test_not_enough_data() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let table = WeatherTable::from_raw_records(vec![WeatherRecord::new(
            date,
            Some(1.0),
            Some(50.0),
            Some(0.0),
            Some(2.0),
        )])
        .unwrap();

        let report = ReportBuilder::new().report_at(&table, 42, timestamp());
        assert!(report.contains("Analyzed N/A records.\n"));
        assert!(report.contains("Not enough data for meaningful anomaly detection."));
    }

    #[test]
    fn test_missing_features() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let table = WeatherTable::new(
            vec![Column::Date, Column::Temperature],
            vec![WeatherRecord::new(date, Some(30.0), None, None, None)],
        )
        .unwrap();

        let report = ReportBuilder::new().report_at(&table, 42, timestamp());
        assert!(report.contains("Anomaly detection skipped"));
        assert!(report.contains("- Mean temperature is high; possible heat risk."));
    }

    #[test]
    fn test_narrator_failure_falls_back_to_rules() {
        let report = ReportBuilder::new()
            .with_narrator(Box::new(FailingNarrator))
            .report_at(&table_with_outlier(), 42, timestamp());

        assert!(!report.contains("Broken"));
        assert!(report.contains("### 3. Insights\n"));
    }

    #[test]
    fn test_custom_narrator() {
        let report = ReportBuilder::new()
            .with_narrator(Box::new(FixedNarrator))
            .report_at(&table_with_outlier(), 42, timestamp());

        assert!(report.contains("### 3. External Insights\nLooks seasonal.\n"));
    }

    #[test]
    fn test_report_is_reproducible_for_a_seed() {
        let table = table_with_outlier();
        let builder = ReportBuilder::new();
        assert_eq!(
            builder.report_at(&table, 7, timestamp()),
            builder.report_at(&table, 7, timestamp())
        );
    }
}
