use std::path::Path;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::generators::SeriesGenerator;
use crate::models::WeatherTable;
use crate::processors::{CleaningReport, DataCleaner};
use crate::readers::CsvTableReader;
use crate::writers::SnapshotStore;

/// A cleaned table together with how it was produced.
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub table: WeatherTable,
    pub cleaning: CleaningReport,
    /// True when the generated default dataset stands in for a failed load.
    pub used_fallback: bool,
}

/// Generate or load a table, snapshot it and clean it.
pub struct WeatherPipeline {
    config: PipelineConfig,
    generator: SeriesGenerator,
    cleaner: DataCleaner,
    snapshots: Option<SnapshotStore>,
}

impl WeatherPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let generator =
            SeriesGenerator::new().with_dry_day_probability(config.generator.dry_day_probability);
        let snapshots = config.snapshots.enabled.then(|| {
            SnapshotStore::new(
                config.snapshots.raw_dir.clone(),
                config.snapshots.processed_dir.clone(),
            )
        });

        Self {
            config,
            generator,
            cleaner: DataCleaner::new(),
            snapshots,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Synthetic table for the configured date range and seed.
    pub fn generate(&self) -> Result<WeatherTable> {
        let settings = &self.config.generator;
        let table = self
            .generator
            .generate(settings.start_date, settings.end_date, settings.seed)?;
        if let Some(store) = &self.snapshots {
            store.save_raw(&table);
        }
        Ok(table)
    }

    pub fn clean(&self, table: &WeatherTable) -> Result<(WeatherTable, CleaningReport)> {
        let cleaned = self.cleaner.clean(table)?;
        Ok(self.finish_cleaning(cleaned))
    }

    fn finish_cleaning(
        &self,
        (cleaned, report): (WeatherTable, CleaningReport),
    ) -> (WeatherTable, CleaningReport) {
        if let Some(store) = &self.snapshots {
            store.save_processed(&cleaned);
        }
        info!(
            rows = cleaned.len(),
            clipped = report.total_clipped(),
            missing = report.total_missing(),
            "dataset ready"
        );
        (cleaned, report)
    }

    /// Generate and clean the default dataset.
    pub fn default_dataset(&self) -> Result<PreparedDataset> {
        let raw = self.generate()?;
        let (table, cleaning) = self.clean(&raw)?;
        Ok(PreparedDataset {
            table,
            cleaning,
            used_fallback: false,
        })
    }

    /// Load and clean `source`, or the default dataset when no source is given.
    ///
    /// A source that cannot be read (missing file, no `date` column, bad
    /// dates) is logged and replaced by the default dataset. A readable
    /// source that lacks feature columns is kept; detection reports the
    /// missing features later.
    pub fn load_dataset(&self, source: Option<&Path>) -> Result<PreparedDataset> {
        let Some(path) = source else {
            return self.default_dataset();
        };

        let loaded = CsvTableReader::new()
            .read(path)
            .and_then(|raw| self.cleaner.clean_present(&raw))
            .map(|cleaned| self.finish_cleaning(cleaned));

        match loaded {
            Ok((table, cleaning)) => Ok(PreparedDataset {
                table,
                cleaning,
                used_fallback: false,
            }),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "could not use uploaded data, falling back to the default dataset"
                );
                let mut dataset = self.default_dataset()?;
                dataset.used_fallback = true;
                Ok(dataset)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SnapshotSettings;
    use crate::models::Column;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.generator.start_date = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        config.generator.end_date = NaiveDate::from_ymd_opt(2023, 3, 31).unwrap();
        config.snapshots = SnapshotSettings {
            enabled: true,
            raw_dir: dir.path().join("raw"),
            processed_dir: dir.path().join("processed"),
        };
        config
    }

    #[test]
    fn test_default_dataset_writes_snapshots() {
        let dir = TempDir::new().unwrap();
        let pipeline = WeatherPipeline::new(config(&dir));

        let dataset = pipeline.load_dataset(None).unwrap();
        assert_eq!(dataset.table.len(), 31);
        assert!(!dataset.used_fallback);
        assert!(dataset.table.has_column(Column::Season));
        assert!(dir.path().join("raw/weather_data.csv").exists());
        assert!(dir.path().join("processed/weather_data_clean.csv").exists());
    }

    #[test]
    fn test_uploaded_table_is_cleaned() {
        let dir = TempDir::new().unwrap();
        let upload = dir.path().join("upload.csv");
        std::fs::write(
            &upload,
            "date,temperature,humidity,precipitation\n\
             2023-08-02,61.0,40,0\n\
             2023-08-01,20.0,140,-3\n",
        )
        .unwrap();

        let pipeline = WeatherPipeline::new(config(&dir));
        let dataset = pipeline.load_dataset(Some(&upload)).unwrap();

        assert!(!dataset.used_fallback);
        assert_eq!(dataset.table.len(), 2);
        let first = &dataset.table.records()[0];
        assert_eq!(first.humidity, Some(100.0));
        assert_eq!(first.precipitation, Some(0.0));
        assert_eq!(dataset.table.records()[1].temperature, Some(50.0));
        assert!(!dataset.table.has_column(Column::WindSpeed));
    }

    #[test]
    fn test_upload_without_some_features_is_kept() {
        let dir = TempDir::new().unwrap();
        let upload = dir.path().join("upload.csv");
        std::fs::write(
            &upload,
            "date,temperature,humidity,wind_speed\n\
             2023-08-01,21.0,55,3.0\n\
             2023-08-02,22.5,60,2.5\n\
             2023-08-03,19.0,58,4.0\n",
        )
        .unwrap();

        let pipeline = WeatherPipeline::new(config(&dir));
        let dataset = pipeline.load_dataset(Some(&upload)).unwrap();
        assert!(!dataset.used_fallback);
        assert_eq!(dataset.table.len(), 3);
        assert!(!dataset.table.has_column(Column::Precipitation));
        assert!(dataset.table.has_column(Column::Season));

        let wind_only = dir.path().join("wind.csv");
        std::fs::write(&wind_only, "date,wind_speed\n2023-08-01,3.0\n").unwrap();
        let dataset = pipeline.load_dataset(Some(&wind_only)).unwrap();
        assert!(!dataset.used_fallback);
        assert_eq!(dataset.table.len(), 1);
    }

    #[test]
    fn test_unreadable_upload_falls_back() {
        let dir = TempDir::new().unwrap();
        let upload = dir.path().join("upload.csv");
        std::fs::write(&upload, "day,temperature\n2023-08-01,3.0\n").unwrap();

        let pipeline = WeatherPipeline::new(config(&dir));
        let dataset = pipeline.load_dataset(Some(&upload)).unwrap();
        assert!(dataset.used_fallback);
        assert_eq!(dataset.table.len(), 31);

        let missing = pipeline
            .load_dataset(Some(&dir.path().join("absent.csv")))
            .unwrap();
        assert!(missing.used_fallback);
    }

    #[test]
    fn test_snapshots_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.snapshots.enabled = false;

        WeatherPipeline::new(config).load_dataset(None).unwrap();
        assert!(!dir.path().join("raw").exists());
    }
}
