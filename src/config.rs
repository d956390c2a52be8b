use chrono::NaiveDate;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use validator::Validate;

use crate::detectors::{AnomalyDetector, Contamination};
use crate::error::{ProcessingError, Result};
use crate::models::Feature;
use crate::utils::constants::{
    DEFAULT_CONFIG_FILE, DEFAULT_END_DATE, DEFAULT_MAX_SAMPLES, DEFAULT_NARRATOR_TIMEOUT_SECS,
    DEFAULT_N_ESTIMATORS, DEFAULT_PROCESSED_DIR, DEFAULT_RAW_DIR, DEFAULT_SEED,
    DEFAULT_START_DATE, DRY_DAY_PROBABILITY, ENV_PREFIX,
};

/// Settings for every stage of the pipeline.
///
/// Loaded from built-in defaults, then an optional TOML file, then
/// `WEATHER_ANOMALY__<SECTION>__<KEY>` environment variables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    #[validate(nested)]
    pub generator: GeneratorSettings,
    pub snapshots: SnapshotSettings,
    #[validate(nested)]
    pub detector: DetectorSettings,
    #[validate(nested)]
    pub narrative: NarrativeSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GeneratorSettings {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub seed: u64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub dry_day_probability: f64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            start_date: default_date(DEFAULT_START_DATE),
            end_date: default_date(DEFAULT_END_DATE),
            seed: DEFAULT_SEED,
            dry_day_probability: DRY_DAY_PROBABILITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    pub enabled: bool,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            raw_dir: PathBuf::from(DEFAULT_RAW_DIR),
            processed_dir: PathBuf::from(DEFAULT_PROCESSED_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DetectorSettings {
    #[validate(length(min = 1))]
    pub features: Vec<Feature>,
    pub contamination: Contamination,
    pub seed: u64,
    #[validate(range(min = 1))]
    pub n_estimators: usize,
    #[validate(range(min = 1))]
    pub max_samples: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            features: Feature::ALL.to_vec(),
            contamination: Contamination::Auto,
            seed: DEFAULT_SEED,
            n_estimators: DEFAULT_N_ESTIMATORS,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

impl DetectorSettings {
    pub fn detector(&self) -> AnomalyDetector {
        AnomalyDetector::new()
            .with_features(self.features.clone())
            .with_contamination(self.contamination)
            .with_seed(self.seed)
            .with_n_estimators(self.n_estimators)
            .with_max_samples(self.max_samples)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeMode {
    #[default]
    Rules,
    Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NarrativeSettings {
    pub mode: NarrativeMode,
    /// Program run in `command` mode; receives the prompt on stdin.
    pub command: Option<String>,
    pub args: Vec<String>,
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
}

impl Default for NarrativeSettings {
    fn default() -> Self {
        Self {
            mode: NarrativeMode::Rules,
            command: None,
            args: Vec::new(),
            timeout_secs: DEFAULT_NARRATOR_TIMEOUT_SECS,
        }
    }
}

impl PipelineConfig {
    /// Layer defaults, the config file and the environment.
    ///
    /// Without an explicit `path`, `weather-anomaly.toml` in the working
    /// directory is used when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(" ")
                    .with_list_parse_key("narrative.args")
                    .with_list_parse_key("detector.features"),
            )
            .build()?;

        let config: PipelineConfig = settings.try_deserialize()?;
        config.validated()
    }

    /// Check field ranges and cross-field rules.
    pub fn validated(self) -> Result<Self> {
        self.validate()?;

        let generator = &self.generator;
        if generator.start_date > generator.end_date {
            return Err(ProcessingError::InvalidDateRange {
                start: generator.start_date,
                end: generator.end_date,
            });
        }
        self.detector.contamination.validate()?;
        if self.narrative.mode == NarrativeMode::Command && self.narrative.command.is_none() {
            return Err(ProcessingError::Config(
                "narrative.command must be set when narrative.mode is \"command\"".to_string(),
            ));
        }

        debug!(config = ?self, "configuration loaded");
        Ok(self)
    }
}

fn default_date(text: &str) -> NaiveDate {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default().validated().unwrap();

        assert_eq!(
            config.generator.start_date,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
        );
        assert_eq!(
            config.generator.end_date,
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
        assert_eq!(config.generator.seed, 42);
        assert_eq!(config.detector.contamination, Contamination::Auto);
        assert_eq!(config.detector.features, Feature::ALL.to_vec());
        assert_eq!(config.narrative.mode, NarrativeMode::Rules);
        assert!(config.snapshots.enabled);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = toml_file(
            r#"
[generator]
start_date = "2024-02-01"
end_date = "2024-02-29"
seed = 7

[detector]
contamination = "0.1"
features = ["temperature", "humidity"]

[snapshots]
enabled = false
"#,
        );

        let config = PipelineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.generator.seed, 7);
        assert_eq!(
            config.generator.end_date,
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(config.detector.contamination, Contamination::Fraction(0.1));
        assert_eq!(
            config.detector.features,
            vec![Feature::Temperature, Feature::Humidity]
        );
        assert!(!config.snapshots.enabled);
        // Untouched sections keep their defaults
        assert_eq!(config.narrative, NarrativeSettings::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = PipelineConfig::default();
        config.generator.dry_day_probability = 1.5;
        assert!(matches!(
            config.validated(),
            Err(ProcessingError::Validation(_))
        ));

        let mut config = PipelineConfig::default();
        config.generator.start_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(matches!(
            config.validated(),
            Err(ProcessingError::InvalidDateRange { .. })
        ));

        let mut config = PipelineConfig::default();
        config.detector.contamination = Contamination::Fraction(0.9);
        assert!(config.validated().is_err());

        let mut config = PipelineConfig::default();
        config.narrative.mode = NarrativeMode::Command;
        assert!(matches!(config.validated(), Err(ProcessingError::Config(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PipelineConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
