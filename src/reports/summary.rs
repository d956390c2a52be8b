use crate::models::{Feature, WeatherTable};

pub const NO_DATA_SUMMARY: &str = "No data available; cannot generate a summary.";
pub const NO_METRICS_SUMMARY: &str = "The data contains no analyzable weather metrics.";

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// One-paragraph overview of temperature, humidity and precipitation.
///
/// A column that is absent, or present with every value missing, is left out.
pub fn summarize(table: &WeatherTable) -> String {
    if table.is_empty() {
        return NO_DATA_SUMMARY.to_string();
    }

    let mut parts = Vec::new();

    let temperatures = table.present_values(Feature::Temperature);
    if !temperatures.is_empty() {
        let max = temperatures.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = temperatures.iter().copied().fold(f64::INFINITY, f64::min);
        parts.push(format!(
            "Average temperature is {:.1}°C (max {:.1}°C, min {:.1}°C).",
            mean(&temperatures),
            max,
            min
        ));
    }

    let humidity = table.present_values(Feature::Humidity);
    if !humidity.is_empty() {
        parts.push(format!("Average humidity is {:.1}%.", mean(&humidity)));
    }

    let precipitation = table.present_values(Feature::Precipitation);
    if !precipitation.is_empty() {
        let total: f64 = precipitation.iter().sum();
        let wet_days = precipitation.iter().filter(|p| **p > 0.0).count();
        parts.push(format!(
            "Total precipitation is {:.1}mm across {} days with precipitation.",
            total, wet_days
        ));
    }

    if parts.is_empty() {
        return NO_METRICS_SUMMARY.to_string();
    }

    parts.join(" ")
}
