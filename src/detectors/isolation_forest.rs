//! Isolation forest outlier model.
//!
//! Each tree recursively partitions a random subsample on a random feature at
//! a random threshold between the feature's minimum and maximum. Points that
//! are easy to separate end up close to the root, so a short average path
//! length across the ensemble means "anomalous". Scores follow the usual
//! convention: `score_samples` lies in `[-1, 0)`, and the decision function
//! subtracts an offset so that negative values are outliers.

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProcessingError, Result};
use crate::utils::constants::{
    AUTO_CONTAMINATION_OFFSET, DEFAULT_MAX_SAMPLES, DEFAULT_N_ESTIMATORS, DEFAULT_SEED,
    MAX_CONTAMINATION,
};

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Expected share of outliers, used to place the decision threshold.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Contamination {
    /// Fixed offset of -0.5 on the raw score.
    #[default]
    Auto,
    /// Threshold at this quantile of the training scores, in (0, 0.5].
    Fraction(f64),
}

impl Contamination {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Contamination::Auto => Ok(()),
            Contamination::Fraction(f) if f > 0.0 && f <= MAX_CONTAMINATION => Ok(()),
            Contamination::Fraction(f) => Err(ProcessingError::Model(format!(
                "contamination must be in (0, {}], got {}",
                MAX_CONTAMINATION, f
            ))),
        }
    }
}

impl fmt::Display for Contamination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contamination::Auto => f.write_str("auto"),
            Contamination::Fraction(v) => write!(f, "{}", v),
        }
    }
}

impl FromStr for Contamination {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Contamination::Auto);
        }
        s.parse::<f64>()
            .map(Contamination::Fraction)
            .map_err(|_| {
                ProcessingError::InvalidFormat(format!(
                    "contamination must be 'auto' or a number, got '{}'",
                    s
                ))
            })
    }
}

impl TryFrom<String> for Contamination {
    type Error = ProcessingError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Contamination> for String {
    fn from(value: Contamination) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: Contamination,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: DEFAULT_N_ESTIMATORS,
            max_samples: DEFAULT_MAX_SAMPLES,
            contamination: Contamination::Auto,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn grow(
        data: &[Vec<f64>],
        indices: Vec<usize>,
        max_depth: usize,
        rng: &mut ChaCha20Rng,
    ) -> Self {
        Self {
            root: grow_node(data, indices, 0, max_depth, rng),
        }
    }

    fn path_length(&self, point: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if point[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                    depth += 1.0;
                }
            }
        }
    }
}

fn grow_node(
    data: &[Vec<f64>],
    indices: Vec<usize>,
    depth: usize,
    max_depth: usize,
    rng: &mut ChaCha20Rng,
) -> Node {
    if depth >= max_depth || indices.len() <= 1 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Only features that still vary inside this node can split it
    let n_features = data[indices[0]].len();
    let candidates: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|feature| {
            let (min, max) = indices.iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), &i| (lo.min(data[i][feature]), hi.max(data[i][feature])),
            );
            (max > min).then_some((feature, min, max))
        })
        .collect();

    if candidates.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(min..max);

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| data[i][feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow_node(data, left, depth + 1, max_depth, rng)),
        right: Box::new(grow_node(data, right, depth + 1, max_depth, rng)),
    }
}

/// Average path length of an unsuccessful binary search tree lookup over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile, `q` in [0, 100].
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let position = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

/// A fitted isolation forest. Holds no state besides its trees and threshold.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    n_features: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fit the ensemble on a dense, finite feature matrix (rows × features).
    pub fn fit(data: &[Vec<f64>], params: &ForestParams) -> Result<Self> {
        params.contamination.validate()?;

        if data.is_empty() {
            return Err(ProcessingError::Model("no samples to fit".to_string()));
        }
        if params.n_estimators == 0 || params.max_samples == 0 {
            return Err(ProcessingError::Model(
                "n_estimators and max_samples must be positive".to_string(),
            ));
        }

        let n_features = data[0].len();
        if n_features == 0 {
            return Err(ProcessingError::Model("no features to fit".to_string()));
        }
        for (row, values) in data.iter().enumerate() {
            if values.len() != n_features {
                return Err(ProcessingError::Model(format!(
                    "row {} has {} features, expected {}",
                    row,
                    values.len(),
                    n_features
                )));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ProcessingError::Model(format!(
                    "row {} contains a non-finite value",
                    row
                )));
            }
        }

        for feature in 0..n_features {
            let (min, max) = data
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), row| {
                    (lo.min(row[feature]), hi.max(row[feature]))
                });
            if !(max - min).is_finite() {
                return Err(ProcessingError::Model(format!(
                    "feature {} spans a range too wide to split",
                    feature
                )));
            }
        }

        let sample_size = params.max_samples.min(data.len());
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;
        let mut rng = ChaCha20Rng::seed_from_u64(params.seed);

        let trees = (0..params.n_estimators)
            .map(|_| {
                let indices = index::sample(&mut rng, data.len(), sample_size).into_vec();
                IsolationTree::grow(data, indices, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            n_features,
            offset: AUTO_CONTAMINATION_OFFSET,
        };

        if let Contamination::Fraction(fraction) = params.contamination {
            let scores = forest.score_samples(data)?;
            forest.offset = percentile(&scores, 100.0 * fraction);
        }

        Ok(forest)
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw scores in `[-1, 0)`; lower is more anomalous.
    pub fn score_samples(&self, data: &[Vec<f64>]) -> Result<Vec<f64>> {
        let normaliser = average_path_length(self.sample_size);
        data.iter()
            .map(|point| {
                if point.len() != self.n_features {
                    return Err(ProcessingError::Model(format!(
                        "expected {} features, got {}",
                        self.n_features,
                        point.len()
                    )));
                }
                let mean_path = self
                    .trees
                    .iter()
                    .map(|tree| tree.path_length(point))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                // A single-point sample has no spread, every point is average
                let depth_ratio = if normaliser > 0.0 {
                    mean_path / normaliser
                } else {
                    1.0
                };
                Ok(-(2f64.powf(-depth_ratio)))
            })
            .collect()
    }

    /// Shifted scores: negative means outlier, higher means more normal.
    pub fn decision_function(&self, data: &[Vec<f64>]) -> Result<Vec<f64>> {
        Ok(self
            .score_samples(data)?
            .into_iter()
            .map(|s| s - self.offset)
            .collect())
    }

    /// `true` for rows the model classifies as outliers.
    pub fn predict(&self, data: &[Vec<f64>]) -> Result<Vec<bool>> {
        Ok(self
            .decision_function(data)?
            .into_iter()
            .map(|d| d < 0.0)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered_with_outlier() -> Vec<Vec<f64>> {
        let mut data: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let jitter = (i % 7) as f64 * 0.3;
                vec![10.0 + jitter, 60.0 + jitter * 2.0, (i % 3) as f64, 4.0 + jitter]
            })
            .collect();
        data.push(vec![1000.0, 61.0, 1.0, 4.5]);
        data
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.244).abs() < 1e-3, "c(256) = {}", c256);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&values, 10.0) - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_contamination_parsing() {
        assert_eq!("auto".parse::<Contamination>().unwrap(), Contamination::Auto);
        assert_eq!(
            "0.05".parse::<Contamination>().unwrap(),
            Contamination::Fraction(0.05)
        );
        assert!("lots".parse::<Contamination>().is_err());
        assert!(Contamination::Fraction(0.0).validate().is_err());
        assert!(Contamination::Fraction(0.6).validate().is_err());
        assert!(Contamination::Fraction(0.5).validate().is_ok());
        assert_eq!(Contamination::Auto.to_string(), "auto");
    }

    #[test]
    fn test_extreme_outlier_scores_lowest_and_is_flagged() {
        let data = clustered_with_outlier();
        let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();

        let scores = forest.decision_function(&data).unwrap();
        let labels = forest.predict(&data).unwrap();
        let outlier = data.len() - 1;

        let lowest = scores
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(lowest, outlier);
        assert!(labels[outlier]);
        assert!(scores[outlier] < 0.0);
    }

    #[test]
    fn test_scores_are_reproducible_per_seed() {
        let data = clustered_with_outlier();
        let params = ForestParams::default();

        let a = IsolationForest::fit(&data, &params)
            .unwrap()
            .score_samples(&data)
            .unwrap();
        let b = IsolationForest::fit(&data, &params)
            .unwrap()
            .score_samples(&data)
            .unwrap();
        assert_eq!(a, b);

        let other = ForestParams {
            seed: 7,
            ..params
        };
        let c = IsolationForest::fit(&data, &other)
            .unwrap()
            .score_samples(&data)
            .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_overflowing_feature_range_is_rejected() {
        let data: Vec<Vec<f64>> = (0..10)
            .map(|i| {
                let extreme = if i % 2 == 0 { -1.5e308 } else { 1.5e308 };
                vec![extreme, 60.0 + i as f64]
            })
            .collect();

        match IsolationForest::fit(&data, &ForestParams::default()) {
            Err(ProcessingError::Model(message)) => assert!(message.contains("feature 0")),
            other => panic!("unexpected result: {:?}", other.map(|f| f.n_trees())),
        }
    }

    #[test]
    fn test_raw_scores_are_bounded() {
        let data = clustered_with_outlier();
        let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
        for score in forest.score_samples(&data).unwrap() {
            assert!((-1.0..0.0).contains(&score));
        }
    }

    #[test]
    fn test_fraction_contamination_sets_threshold_quantile() {
        let data: Vec<Vec<f64>> = (0..200)
            .map(|i| {
                let x = i as f64;
                vec![(x * 0.37).sin() * 5.0, (x * 0.11).cos() * 20.0 + 50.0]
            })
            .collect();
        let params = ForestParams {
            contamination: Contamination::Fraction(0.1),
            ..ForestParams::default()
        };
        let forest = IsolationForest::fit(&data, &params).unwrap();
        let flagged = forest.predict(&data).unwrap().into_iter().filter(|&a| a).count();

        assert!((15..=25).contains(&flagged), "flagged {}", flagged);
        assert!(forest.offset() < 0.0);
    }

    #[test]
    fn test_identical_rows_sit_on_the_boundary() {
        let data = vec![vec![1.0, 2.0]; 10];
        let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();

        let scores = forest.decision_function(&data).unwrap();
        assert!(scores.iter().all(|s| s.abs() < 1e-12));
    }

    #[test]
    fn test_fit_rejects_degenerate_input() {
        let params = ForestParams::default();
        assert!(IsolationForest::fit(&[], &params).is_err());
        assert!(IsolationForest::fit(&[vec![], vec![]], &params).is_err());
        assert!(IsolationForest::fit(&[vec![1.0], vec![f64::NAN]], &params).is_err());
        assert!(IsolationForest::fit(&[vec![1.0, 2.0], vec![1.0]], &params).is_err());

        let bad = ForestParams {
            contamination: Contamination::Fraction(0.9),
            ..ForestParams::default()
        };
        assert!(IsolationForest::fit(&[vec![1.0], vec![2.0]], &bad).is_err());
    }
}
