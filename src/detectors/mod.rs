pub mod anomaly_detector;
pub mod isolation_forest;

pub use anomaly_detector::{AnomalyDetector, DetectionInfo, DetectionOutcome, SkipReason};
pub use isolation_forest::{Contamination, ForestParams, IsolationForest};
