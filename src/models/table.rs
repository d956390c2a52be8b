use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, Result};
use crate::models::weather::{Column, Feature, WeatherRecord};

/// A daily weather table: the columns that are present plus one record per date.
///
/// Column presence is tracked separately from value presence. A record may hold
/// `None` for a column that exists (missing value), while a column that is not
/// listed is absent from the whole table. Dates are unique and ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherTable {
    columns: Vec<Column>,
    records: Vec<WeatherRecord>,
}

impl WeatherTable {
    pub fn new(columns: Vec<Column>, records: Vec<WeatherRecord>) -> Result<Self> {
        if !columns.contains(&Column::Date) {
            return Err(ProcessingError::MissingColumn(Column::Date.to_string()));
        }

        for window in records.windows(2) {
            if window[1].date == window[0].date {
                return Err(ProcessingError::DuplicateDate(window[1].date));
            }
            if window[1].date < window[0].date {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Dates are not ascending: {} follows {}",
                    window[1].date, window[0].date
                )));
            }
        }

        let mut table = Self {
            columns: Vec::with_capacity(columns.len()),
            records,
        };
        for column in columns {
            table.add_column(column);
        }
        Ok(table)
    }

    /// Build a table with the generator's columns.
    pub fn from_raw_records(records: Vec<WeatherRecord>) -> Result<Self> {
        Self::new(Column::RAW.to_vec(), records)
    }

    /// An empty table that still carries the raw schema.
    pub fn empty() -> Self {
        Self {
            columns: Column::RAW.to_vec(),
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Present columns in canonical order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.has_column(feature.column())
    }

    /// Mark a column as present, keeping canonical order.
    pub fn add_column(&mut self, column: Column) {
        if !self.columns.contains(&column) {
            self.columns.push(column);
            self.columns.sort();
        }
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [WeatherRecord] {
        &mut self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WeatherRecord> {
        self.records.iter()
    }

    /// Values of a feature column; empty when the column is absent.
    pub fn feature_values(&self, feature: Feature) -> Vec<Option<f64>> {
        if !self.has_feature(feature) {
            return Vec::new();
        }
        self.records.iter().map(|r| feature.value(r)).collect()
    }

    /// Present (non-missing) values of a feature column.
    pub fn present_values(&self, feature: Feature) -> Vec<f64> {
        self.feature_values(feature).into_iter().flatten().collect()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        }
    }

    /// A new table with the same columns and the records that satisfy `predicate`.
    pub fn retain_copy<F>(&self, predicate: F) -> Self
    where
        F: Fn(&WeatherRecord) -> bool,
    {
        Self {
            columns: self.columns.clone(),
            records: self
                .records
                .iter()
                .filter(|r| predicate(r))
                .cloned()
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a WeatherTable {
    type Item = &'a WeatherRecord;
    type IntoIter = std::slice::Iter<'a, WeatherRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
