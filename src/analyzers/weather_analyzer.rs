use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{ProcessingError, Result};
use crate::models::{Column, Feature, Season, WeatherTable};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl ColumnStats {
    /// Describe a column; `None` when it has no values.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;

        Some(Self {
            count,
            mean,
            std: sample_std(&sorted, mean),
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted[count - 1],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherStatistics {
    pub total_records: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub columns: BTreeMap<Feature, ColumnStats>,
    pub missing_values: BTreeMap<Column, usize>,
    /// Pearson correlations between every pair of present features.
    pub correlation: BTreeMap<(Feature, Feature), f64>,
}

impl WeatherStatistics {
    pub fn correlation_between(&self, a: Feature, b: Feature) -> Option<f64> {
        self.correlation
            .get(&(a, b))
            .or_else(|| self.correlation.get(&(b, a)))
            .copied()
    }

    pub fn summary(&self) -> String {
        let date_range = match self.date_range {
            Some((start, end)) => format!(
                "{} to {} ({} days)",
                start,
                end,
                end.signed_duration_since(start).num_days() + 1
            ),
            None => "No dates".to_string(),
        };

        let missing: usize = self.missing_values.values().sum();

        format!(
            "Weather Parameters: {}\n\
            Date Range: {}\n\
            Records: {} total\n\
            Missing Values: {}",
            self.columns
                .keys()
                .map(|f| f.name())
                .collect::<Vec<_>>()
                .join(", "),
            date_range,
            self.total_records,
            missing
        )
    }

    pub fn detailed_summary(&self) -> String {
        let mut out = self.summary();

        out.push_str("\n\nDescriptive Statistics:\n");
        out.push_str(&format!(
            "  {:<14} {:>6} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}\n",
            "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        ));
        for (feature, stats) in &self.columns {
            out.push_str(&format!(
                "  {:<14} {:>6} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2}\n",
                feature.name(),
                stats.count,
                stats.mean,
                stats.std,
                stats.min,
                stats.q25,
                stats.median,
                stats.q75,
                stats.max
            ));
        }

        if !self.correlation.is_empty() {
            out.push_str("\nCorrelations:\n");
            for ((a, b), r) in &self.correlation {
                out.push_str(&format!("  - {} / {}: {:.2}\n", a, b, r));
            }
        }

        let missing: Vec<String> = self
            .missing_values
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(c, n)| format!("{}={}", c, n))
            .collect();
        if !missing.is_empty() {
            out.push_str(&format!("\nMissing: {}\n", missing.join(", ")));
        }

        out
    }
}

/// Descriptive statistics over a weather table.
pub struct WeatherAnalyzer;

impl WeatherAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, table: &WeatherTable) -> Result<WeatherStatistics> {
        if table.is_empty() {
            return Err(ProcessingError::MissingData(
                "No records to analyze".to_string(),
            ));
        }

        let present: Vec<Feature> = Feature::ALL
            .into_iter()
            .filter(|f| table.has_feature(*f))
            .collect();

        let columns = present
            .iter()
            .filter_map(|f| ColumnStats::from_values(&table.present_values(*f)).map(|s| (*f, s)))
            .collect();

        let missing_values = table
            .columns()
            .iter()
            .map(|c| (*c, table.iter().filter(|r| r.cell(*c).is_empty()).count()))
            .collect();

        let mut correlation = BTreeMap::new();
        for (i, a) in present.iter().enumerate() {
            for b in &present[i + 1..] {
                if let Some(r) = pearson(table, *a, *b) {
                    correlation.insert((*a, *b), r);
                }
            }
        }

        Ok(WeatherStatistics {
            total_records: table.len(),
            date_range: table.date_range(),
            columns,
            missing_values,
            correlation,
        })
    }

    /// Per-season aggregates of one feature. Rows without a season are ignored.
    pub fn seasonal_stats(
        &self,
        table: &WeatherTable,
        feature: Feature,
    ) -> BTreeMap<Season, SeasonStats> {
        let mut groups: BTreeMap<Season, Vec<f64>> = BTreeMap::new();
        for record in table {
            if let (Some(season), Some(value)) = (record.season, feature.value(record)) {
                groups.entry(season).or_default().push(value);
            }
        }

        groups
            .into_iter()
            .filter_map(|(season, values)| {
                ColumnStats::from_values(&values).map(|s| {
                    (
                        season,
                        SeasonStats {
                            count: s.count,
                            mean: s.mean,
                            std: s.std,
                            min: s.min,
                            max: s.max,
                        },
                    )
                })
            })
            .collect()
    }
}

impl Default for WeatherAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

/// Pearson correlation over rows where both values are present.
fn pearson(table: &WeatherTable, a: Feature, b: Feature) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = table
        .iter()
        .filter_map(|r| Some((a.value(r)?, b.value(r)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }

    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}
