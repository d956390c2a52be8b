pub mod analyzers;
pub mod cli;
pub mod config;
pub mod detectors;
pub mod error;
pub mod generators;
pub mod models;
pub mod pipeline;
pub mod processors;
pub mod readers;
pub mod reports;
pub mod utils;
pub mod writers;

pub use config::PipelineConfig;
pub use error::{ProcessingError, Result};
pub use pipeline::{PreparedDataset, WeatherPipeline};
