pub mod table;
pub mod weather;

pub use table::WeatherTable;
pub use weather::{Column, Feature, Season, WeatherRecord, WeatherRecordBuilder};
