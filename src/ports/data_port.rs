//! Data access port traits: the symbol universe and market history.

use crate::domain::error::ScreenerError;
use crate::domain::panel::MarketPanel;
use chrono::{Duration, NaiveDate};

/// Inclusive date range of history to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HistoryWindow {
    /// The `lookback_days` calendar days ending at `end`.
    pub fn ending_at(end: NaiveDate, lookback_days: i64) -> Result<Self, ScreenerError> {
        let start = Duration::try_days(lookback_days)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| ScreenerError::ConfigInvalid {
                section: "screen".to_string(),
                key: "lookback_days".to_string(),
                reason: format!("{} days before {} is out of range", lookback_days, end),
            })?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

pub trait UniversePort {
    /// Raw listing, possibly with a header entry. Callers clean it.
    fn list_symbols(&self) -> Result<Vec<String>, ScreenerError>;
}

pub trait MarketDataPort {
    /// History for every requested symbol that has any. Symbols without data
    /// are absent from the panel; only a whole-batch failure is an error.
    fn fetch_panel(
        &self,
        symbols: &[String],
        window: &HistoryWindow,
    ) -> Result<MarketPanel, ScreenerError>;
}
