use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ProcessingError, Result};
use crate::models::{Column, Feature, WeatherRecord, WeatherTable};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];
const DATETIME_FORMATS: [&str; 1] = ["%Y-%m-%d %H:%M:%S"];
const MISSING_MARKERS: [&str; 3] = ["nan", "na", "null"];

/// Loads an externally supplied daily table from CSV.
///
/// Only `date` is required. Feature columns that are present are parsed,
/// derived and unknown columns are ignored. Empty cells, `NaN`, `NA` and
/// `null` become missing values.
pub struct CsvTableReader {
    delimiter: u8,
}

impl CsvTableReader {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn read(&self, path: &Path) -> Result<WeatherTable> {
        let file = File::open(path)?;
        let table = self.read_from(file)?;
        info!(
            path = %path.display(),
            rows = table.len(),
            "loaded weather table"
        );
        Ok(table)
    }

    pub fn read_from<R: Read>(&self, input: R) -> Result<WeatherTable> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_reader(input);

        let headers = reader.headers()?.clone();
        let date_index = headers
            .iter()
            .position(|h| Column::from_name(h) == Some(Column::Date))
            .ok_or_else(|| ProcessingError::MissingColumn(Column::Date.to_string()))?;

        let feature_indices: Vec<(Feature, usize)> = Feature::ALL
            .into_iter()
            .filter_map(|f| {
                headers
                    .iter()
                    .position(|h| Column::from_name(h) == Some(f.column()))
                    .map(|i| (f, i))
            })
            .collect();
        debug!(
            features = ?feature_indices.iter().map(|(f, _)| f.name()).collect::<Vec<_>>(),
            "recognised feature columns"
        );

        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let line = result?;
            let date = parse_date(line.get(date_index).unwrap_or_default())?;

            let mut record = WeatherRecord::new(date, None, None, None, None);
            for (feature, index) in &feature_indices {
                let value = parse_value(line.get(*index).unwrap_or_default()).map_err(|_| {
                    ProcessingError::InvalidFormat(format!(
                        "Row {}: invalid {} value '{}'",
                        row + 1,
                        feature,
                        line.get(*index).unwrap_or_default()
                    ))
                })?;
                match feature {
                    Feature::Temperature => record.temperature = value,
                    Feature::Humidity => record.humidity = value,
                    Feature::Precipitation => record.precipitation = value,
                    Feature::WindSpeed => record.wind_speed = value,
                }
            }
            records.push(record);
        }

        records.sort_by_key(|r| r.date);

        let mut columns = vec![Column::Date];
        columns.extend(feature_indices.iter().map(|(f, _)| f.column()));
        WeatherTable::new(columns, records)
    }
}

impl Default for CsvTableReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a date cell in any of the accepted layouts.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(datetime.date());
        }
    }
    Err(ProcessingError::InvalidFormat(format!(
        "Unrecognised date '{}'",
        text
    )))
}

fn parse_value(text: &str) -> std::result::Result<Option<f64>, std::num::ParseFloatError> {
    if text.is_empty() || MISSING_MARKERS.iter().any(|m| text.eq_ignore_ascii_case(m)) {
        return Ok(None);
    }
    text.parse::<f64>().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn read(text: &str) -> Result<WeatherTable> {
        CsvTableReader::new().read_from(text.as_bytes())
    }

    #[test]
    fn test_reads_partial_schema_and_sorts() {
        let table = read(
            "date,temperature,note,humidity\n\
             2023-01-03,4.5,foo,70\n\
             2023/01/01,,bar,NaN\n\
             20230102,3.0,,66.5\n\
             2023-01-04,NA,,null\n",
        )
        .unwrap();

        assert_eq!(
            table.columns(),
            &[Column::Date, Column::Temperature, Column::Humidity]
        );
        let dates: Vec<String> = table.iter().map(|r| r.formatted_date()).collect();
        assert_eq!(
            dates,
            vec!["2023-01-01", "2023-01-02", "2023-01-03", "2023-01-04"]
        );

        let first = &table.records()[0];
        assert_eq!(first.temperature, None);
        assert_eq!(first.humidity, None);
        assert_eq!(table.records()[1].humidity, Some(66.5));
        assert_eq!(table.records()[3].missing_measurements(), 4);
    }

    #[test]
    fn test_derived_columns_are_ignored() {
        let table = read(
            "date,temperature,season,is_anomaly\n\
             2023-05-01 00:00:00,12.0,winter,true\n",
        )
        .unwrap();

        assert_eq!(table.columns(), &[Column::Date, Column::Temperature]);
        assert_eq!(table.records()[0].season, None);
        assert_eq!(
            table.records()[0].date,
            NaiveDate::from_ymd_opt(2023, 5, 1).unwrap()
        );
    }

    #[test]
    fn test_missing_date_column() {
        match read("temperature,humidity\n1.0,2.0\n") {
            Err(ProcessingError::MissingColumn(column)) => assert_eq!(column, "date"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_bad_rows_fail_the_load() {
        assert!(read("date,temperature\nyesterday,1.0\n").is_err());
        assert!(read("date,temperature\n2023-01-01,warm\n").is_err());
        assert!(matches!(
            read("date,temperature\n2023-01-01,1.0\n2023/01/01,2.0\n"),
            Err(ProcessingError::DuplicateDate(_))
        ));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let table = CsvTableReader::new()
            .with_delimiter(b';')
            .read_from("date;precipitation\n2023-01-01;1.5\n".as_bytes())
            .unwrap();
        assert_eq!(table.records()[0].precipitation, Some(1.5));
    }
}
