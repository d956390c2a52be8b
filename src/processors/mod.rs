pub mod cleaner;
pub mod filter;

pub use cleaner::{CleaningReport, DataCleaner, REQUIRED_COLUMNS};
pub use filter::TableFilter;
