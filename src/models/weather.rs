use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::{ProcessingError, Result};

/// Season label derived from the month number.
///
/// Buckets are (0, 3], (3, 6], (6, 9], (9, 12] with month 0 folded into the
/// first bucket. The labels are positional and do not follow meteorological
/// seasons: March is `Winter`, December is `Autumn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub const ALL: [Season; 4] = [
        Season::Winter,
        Season::Spring,
        Season::Summer,
        Season::Autumn,
    ];

    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            0..=3 => Some(Season::Winter),
            4..=6 => Some(Season::Spring),
            7..=9 => Some(Season::Summer),
            10..=12 => Some(Season::Autumn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "winter" => Ok(Season::Winter),
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "autumn" => Ok(Season::Autumn),
            other => Err(ProcessingError::InvalidFormat(format!(
                "Unknown season: '{}'",
                other
            ))),
        }
    }
}

/// Every column a weather table can carry, in canonical snapshot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Date,
    Temperature,
    Humidity,
    Precipitation,
    WindSpeed,
    Month,
    Season,
    AnomalyScore,
    IsAnomaly,
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::Date,
        Column::Temperature,
        Column::Humidity,
        Column::Precipitation,
        Column::WindSpeed,
        Column::Month,
        Column::Season,
        Column::AnomalyScore,
        Column::IsAnomaly,
    ];

    /// Columns produced by the generator.
    pub const RAW: [Column; 5] = [
        Column::Date,
        Column::Temperature,
        Column::Humidity,
        Column::Precipitation,
        Column::WindSpeed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Date => "date",
            Column::Temperature => "temperature",
            Column::Humidity => "humidity",
            Column::Precipitation => "precipitation",
            Column::WindSpeed => "wind_speed",
            Column::Month => "month",
            Column::Season => "season",
            Column::AnomalyScore => "anomaly_score",
            Column::IsAnomaly => "is_anomaly",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Column::ALL.into_iter().find(|c| c.name() == name.trim())
    }

    pub fn is_derived(&self) -> bool {
        matches!(
            self,
            Column::Month | Column::Season | Column::AnomalyScore | Column::IsAnomaly
        )
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Numeric columns the anomaly detector can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Temperature,
    Humidity,
    Precipitation,
    WindSpeed,
}

impl Feature {
    pub const ALL: [Feature; 4] = [
        Feature::Temperature,
        Feature::Humidity,
        Feature::Precipitation,
        Feature::WindSpeed,
    ];

    pub fn column(&self) -> Column {
        match self {
            Feature::Temperature => Column::Temperature,
            Feature::Humidity => Column::Humidity,
            Feature::Precipitation => Column::Precipitation,
            Feature::WindSpeed => Column::WindSpeed,
        }
    }

    pub fn name(&self) -> &'static str {
        self.column().name()
    }

    pub fn value(&self, record: &WeatherRecord) -> Option<f64> {
        match self {
            Feature::Temperature => record.temperature,
            Feature::Humidity => record.humidity,
            Feature::Precipitation => record.precipitation,
            Feature::WindSpeed => record.wind_speed,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .into_iter()
            .find(|f| f.name() == s.trim())
            .ok_or_else(|| ProcessingError::InvalidFormat(format!("Unknown feature: '{}'", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct WeatherRecord {
    pub date: NaiveDate,

    // Physical measurements, None when the value is missing
    #[validate(range(min = -50.0, max = 50.0))]
    pub temperature: Option<f64>,

    #[validate(range(min = 0.0, max = 100.0))]
    pub humidity: Option<f64>,

    #[validate(range(min = 0.0))]
    pub precipitation: Option<f64>,

    pub wind_speed: Option<f64>,

    // Derived by the cleaner
    pub month: Option<u32>,
    pub season: Option<Season>,

    // Written by the anomaly detector
    pub anomaly_score: Option<f64>,
    pub is_anomaly: Option<bool>,
}

impl WeatherRecord {
    pub fn new(
        date: NaiveDate,
        temperature: Option<f64>,
        humidity: Option<f64>,
        precipitation: Option<f64>,
        wind_speed: Option<f64>,
    ) -> Self {
        Self {
            date,
            temperature,
            humidity,
            precipitation,
            wind_speed,
            month: None,
            season: None,
            anomaly_score: None,
            is_anomaly: None,
        }
    }

    pub fn builder() -> WeatherRecordBuilder {
        WeatherRecordBuilder::new()
    }

    /// Fill `month` and `season` from the date.
    pub fn derive_calendar_fields(&mut self) {
        let month = self.date.month();
        self.month = Some(month);
        self.season = Season::from_month(month);
    }

    pub fn formatted_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn has_precipitation(&self) -> bool {
        self.precipitation.is_some_and(|p| p > 0.0)
    }

    pub fn missing_measurements(&self) -> usize {
        [
            self.temperature,
            self.humidity,
            self.precipitation,
            self.wind_speed,
        ]
        .iter()
        .filter(|v| v.is_none())
        .count()
    }

    /// Render the value of `column` the way snapshot files store it.
    pub fn cell(&self, column: Column) -> String {
        fn number(value: Option<f64>) -> String {
            value.map(|v| format!("{:?}", v)).unwrap_or_default()
        }

        match column {
            Column::Date => self.formatted_date(),
            Column::Temperature => number(self.temperature),
            Column::Humidity => number(self.humidity),
            Column::Precipitation => number(self.precipitation),
            Column::WindSpeed => number(self.wind_speed),
            Column::Month => self.month.map(|m| m.to_string()).unwrap_or_default(),
            Column::Season => self.season.map(|s| s.to_string()).unwrap_or_default(),
            Column::AnomalyScore => number(self.anomaly_score),
            Column::IsAnomaly => self.is_anomaly.map(|a| a.to_string()).unwrap_or_default(),
        }
    }
}

pub struct WeatherRecordBuilder {
    date: Option<NaiveDate>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    precipitation: Option<f64>,
    wind_speed: Option<f64>,
}

impl Default for WeatherRecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherRecordBuilder {
    pub fn new() -> Self {
        Self {
            date: None,
            temperature: None,
            humidity: None,
            precipitation: None,
            wind_speed: None,
        }
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn humidity(mut self, humidity: f64) -> Self {
        self.humidity = Some(humidity);
        self
    }

    pub fn precipitation(mut self, precip: f64) -> Self {
        self.precipitation = Some(precip);
        self
    }

    pub fn wind_speed(mut self, speed: f64) -> Self {
        self.wind_speed = Some(speed);
        self
    }

    pub fn build(self) -> Result<WeatherRecord> {
        let date = self
            .date
            .ok_or_else(|| ProcessingError::MissingColumn("date".to_string()))?;

        Ok(WeatherRecord::new(
            date,
            self.temperature,
            self.humidity,
            self.precipitation,
            self.wind_speed,
        ))
    }
}
