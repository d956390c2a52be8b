use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::detectors::isolation_forest::{Contamination, ForestParams, IsolationForest};
use crate::error::{ProcessingError, Result};
use crate::models::{Column, Feature, WeatherRecord, WeatherTable};
use crate::utils::constants::{
    DEFAULT_MAX_SAMPLES, DEFAULT_N_ESTIMATORS, DEFAULT_SEED, MIN_DETECTION_ROWS,
};

/// Why detection produced no labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    EmptyOrMissingFeatures,
    NotEnoughData,
    ModelError(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptyOrMissingFeatures => {
                f.write_str("Data is empty or features are missing.")
            }
            SkipReason::NotEnoughData => f.write_str("Not enough data for anomaly detection."),
            SkipReason::ModelError(e) => write!(f, "Error during anomaly detection: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectionInfo {
    Completed {
        total_points_analyzed: usize,
        anomalies_found: usize,
        features_used: Vec<Feature>,
        contamination_setting: Contamination,
    },
    Skipped {
        reason: SkipReason,
        message: String,
    },
}

impl DetectionInfo {
    fn skipped(reason: SkipReason) -> Self {
        let message = reason.to_string();
        DetectionInfo::Skipped { reason, message }
    }
}

/// Result of one detection call. Always well formed, possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionOutcome {
    pub rows_analyzed: usize,
    pub anomalies: Vec<WeatherRecord>,
    pub info: DetectionInfo,
}

impl DetectionOutcome {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            rows_analyzed: 0,
            anomalies: Vec::new(),
            info: DetectionInfo::skipped(reason),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.info, DetectionInfo::Completed { .. })
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len()
    }

    pub fn has_anomalies(&self) -> bool {
        !self.anomalies.is_empty()
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match &self.info {
            DetectionInfo::Skipped { reason, .. } => Some(reason),
            DetectionInfo::Completed { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match &self.info {
            DetectionInfo::Skipped { message, .. } => Some(message),
            DetectionInfo::Completed { .. } => None,
        }
    }

    /// Up to `limit` anomalous dates formatted as YYYY-MM-DD.
    pub fn anomaly_dates(&self, limit: usize) -> Vec<String> {
        self.anomalies
            .iter()
            .take(limit)
            .map(|r| r.formatted_date())
            .collect()
    }
}

/// Labels unusual days with an isolation forest over the numeric features.
///
/// Missing feature values are replaced by their column mean before fitting.
/// That is a lossy shortcut, not a principled imputation. Detection never
/// returns an error: every failure becomes a skipped outcome.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    features: Vec<Feature>,
    contamination: Contamination,
    seed: u64,
    n_estimators: usize,
    max_samples: usize,
}

impl AnomalyDetector {
    pub fn new() -> Self {
        Self {
            features: Feature::ALL.to_vec(),
            contamination: Contamination::Auto,
            seed: DEFAULT_SEED,
            n_estimators: DEFAULT_N_ESTIMATORS,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }

    pub fn with_features(mut self, features: Vec<Feature>) -> Self {
        self.features = features;
        self
    }

    pub fn with_contamination(mut self, contamination: Contamination) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Score every row and add `anomaly_score`/`is_anomaly` to the table.
    ///
    /// The table is only modified when detection completes.
    pub fn detect(&self, table: &mut WeatherTable) -> DetectionOutcome {
        if table.is_empty() || !self.features.iter().all(|f| table.has_feature(*f)) {
            warn!("table is empty or missing required features for anomaly detection");
            return DetectionOutcome::skipped(SkipReason::EmptyOrMissingFeatures);
        }

        let matrix = self.feature_matrix(table);
        if matrix.len() < MIN_DETECTION_ROWS {
            warn!(
                rows = matrix.len(),
                "not enough data points for anomaly detection"
            );
            return DetectionOutcome::skipped(SkipReason::NotEnoughData);
        }

        let (scores, labels) = match self.fit_and_score(table, &matrix) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "anomaly detection failed");
                return DetectionOutcome::skipped(SkipReason::ModelError(e.to_string()));
            }
        };

        for ((record, score), label) in table.records_mut().iter_mut().zip(scores).zip(labels) {
            record.anomaly_score = Some(score);
            record.is_anomaly = Some(label);
        }
        table.add_column(Column::AnomalyScore);
        table.add_column(Column::IsAnomaly);

        let anomalies: Vec<WeatherRecord> = table
            .iter()
            .filter(|r| r.is_anomaly == Some(true))
            .cloned()
            .collect();

        if anomalies.is_empty() {
            info!("no anomalies detected with the current settings");
        } else {
            info!(count = anomalies.len(), "detected anomalies");
        }

        DetectionOutcome {
            rows_analyzed: table.len(),
            info: DetectionInfo::Completed {
                total_points_analyzed: table.len(),
                anomalies_found: anomalies.len(),
                features_used: self.features.clone(),
                contamination_setting: self.contamination,
            },
            anomalies,
        }
    }

    /// Feature rows with missing values replaced by the column mean.
    ///
    /// A column with no values at all keeps NaN, which the model rejects.
    fn feature_matrix(&self, table: &WeatherTable) -> Vec<Vec<f64>> {
        let means: Vec<f64> = self
            .features
            .iter()
            .map(|f| {
                let present = table.present_values(*f);
                if present.is_empty() {
                    f64::NAN
                } else {
                    present.iter().sum::<f64>() / present.len() as f64
                }
            })
            .collect();

        table
            .iter()
            .map(|record| {
                self.features
                    .iter()
                    .zip(&means)
                    .map(|(f, mean)| f.value(record).unwrap_or(*mean))
                    .collect()
            })
            .collect()
    }

    fn fit_and_score(
        &self,
        table: &WeatherTable,
        matrix: &[Vec<f64>],
    ) -> Result<(Vec<f64>, Vec<bool>)> {
        if let Some(feature) = self
            .features
            .iter()
            .find(|f| table.present_values(**f).is_empty())
        {
            return Err(ProcessingError::Model(format!(
                "feature '{}' has no values to impute from",
                feature
            )));
        }

        let params = ForestParams {
            n_estimators: self.n_estimators,
            max_samples: self.max_samples,
            contamination: self.contamination,
            seed: self.seed,
        };
        debug!(
            rows = matrix.len(),
            features = self.features.len(),
            contamination = %self.contamination,
            seed = self.seed,
            "fitting isolation forest"
        );

        let forest = IsolationForest::fit(matrix, &params)?;
        let scores = forest.decision_function(matrix)?;
        let labels = scores.iter().map(|&s| s < 0.0).collect();
        Ok((scores, labels))
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new()
    }
}
