use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::debug;

use crate::models::{Season, WeatherTable};

/// Date and season bounds chosen by the user to narrow a cleaned table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub seasons: BTreeSet<Season>,
}

impl TableFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(mut self, start: NaiveDate) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: NaiveDate) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_seasons<I>(mut self, seasons: I) -> Self
    where
        I: IntoIterator<Item = Season>,
    {
        self.seasons.extend(seasons);
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.seasons.is_empty()
    }

    /// Keep rows inside the inclusive date range whose season is selected.
    ///
    /// With a season restriction, rows without a derived season are dropped.
    pub fn apply(&self, table: &WeatherTable) -> WeatherTable {
        if self.is_unbounded() {
            return table.clone();
        }

        let filtered = table.retain_copy(|record| {
            let after_start = self.start.map_or(true, |s| record.date >= s);
            let before_end = self.end.map_or(true, |e| record.date <= e);
            let season_ok = self.seasons.is_empty()
                || record.season.is_some_and(|s| self.seasons.contains(&s));
            after_start && before_end && season_ok
        });

        debug!(
            before = table.len(),
            after = filtered.len(),
            "applied table filter"
        );
        filtered
    }
}
