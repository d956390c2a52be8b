pub mod narrator;
pub mod report_builder;
pub mod summary;

pub use narrator::{
    narrator_from_settings, CommandNarrator, NarrativeContext, Narrator, RuleBasedNarrator,
};
pub use report_builder::{ReportBuilder, NO_DATA_REPORT};
pub use summary::{summarize, NO_DATA_SUMMARY, NO_METRICS_SUMMARY};
