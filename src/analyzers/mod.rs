pub mod weather_analyzer;

pub use weather_analyzer::{ColumnStats, SeasonStats, WeatherAnalyzer, WeatherStatistics};
