pub mod synthetic;

pub use synthetic::{round_tenth, seasonal_baseline, SeriesGenerator};
