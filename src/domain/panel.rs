//! Market panel and per-symbol records.
//!
//! A [`MarketPanel`] is raw provider output: per channel, a map of symbol to
//! series, with gaps and ragged dates allowed. [`assemble_record`] turns one
//! symbol's slice of it into a [`SymbolRecord`] whose channels share identical
//! dates and carry no missing values.

use crate::domain::ohlcv::Channel;
use crate::domain::series::TimeSeries;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketPanel {
    channels: BTreeMap<Channel, BTreeMap<String, TimeSeries>>,
}

impl MarketPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: Channel, symbol: impl Into<String>, series: TimeSeries) {
        self.channels
            .entry(channel)
            .or_default()
            .insert(symbol.into(), series);
    }

    /// Insert one symbol's rows across all five channels, in
    /// `[open, high, low, close, volume]` order.
    pub fn insert_bars(
        &mut self,
        symbol: &str,
        bars: impl IntoIterator<Item = (NaiveDate, [Option<f64>; 5])>,
    ) {
        let bars: Vec<(NaiveDate, [Option<f64>; 5])> = bars.into_iter().collect();
        for (slot, channel) in Channel::ALL.into_iter().enumerate() {
            let series = TimeSeries::from_unsorted(bars.iter().map(|(d, v)| (*d, v[slot])));
            self.insert(channel, symbol, series);
        }
    }

    pub fn series(&self, channel: Channel, symbol: &str) -> Option<&TimeSeries> {
        self.channels.get(&channel).and_then(|m| m.get(symbol))
    }

    /// Every symbol present in at least one channel.
    pub fn symbols(&self) -> BTreeSet<&str> {
        self.channels
            .values()
            .flat_map(|m| m.keys().map(String::as_str))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.values().all(|m| m.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PanelError {
    #[error("{channel} series for {symbol} does not share the record's dates")]
    Misaligned { symbol: String, channel: Channel },

    #[error("{channel} series for {symbol} has a missing value on {date}")]
    MissingValue {
        symbol: String,
        channel: Channel,
        date: NaiveDate,
    },
}

/// One symbol's aligned history. Every channel it holds has the same dates
/// and no missing values.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRecord {
    symbol: String,
    channels: BTreeMap<Channel, TimeSeries>,
}

impl SymbolRecord {
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            channels: Channel::ALL
                .into_iter()
                .map(|c| (c, TimeSeries::default()))
                .collect(),
        }
    }

    /// Build a full five-channel record from complete rows, in
    /// `[open, high, low, close, volume]` order.
    pub fn from_bars(
        symbol: impl Into<String>,
        bars: impl IntoIterator<Item = (NaiveDate, [f64; 5])>,
    ) -> Self {
        let bars: Vec<(NaiveDate, [f64; 5])> = bars.into_iter().collect();
        let channels = Channel::ALL
            .into_iter()
            .enumerate()
            .map(|(slot, channel)| {
                let series =
                    TimeSeries::from_unsorted(bars.iter().map(|(d, v)| (*d, Some(v[slot]))));
                (channel, series)
            })
            .collect();
        Self {
            symbol: symbol.into(),
            channels,
        }
    }

    /// Build a record from an arbitrary subset of channels, checking alignment.
    pub fn from_channels(
        symbol: impl Into<String>,
        channels: impl IntoIterator<Item = (Channel, TimeSeries)>,
    ) -> Result<Self, PanelError> {
        let symbol = symbol.into();
        let channels: BTreeMap<Channel, TimeSeries> = channels.into_iter().collect();

        let mut reference: Option<Vec<NaiveDate>> = None;
        for (channel, series) in &channels {
            if let Some(point) = series.points().iter().find(|p| p.value.is_none()) {
                return Err(PanelError::MissingValue {
                    symbol,
                    channel: *channel,
                    date: point.date,
                });
            }
            let dates: Vec<NaiveDate> = series.dates().collect();
            match &reference {
                Some(expected) if *expected != dates => {
                    return Err(PanelError::Misaligned {
                        symbol,
                        channel: *channel,
                    });
                }
                Some(_) => {}
                None => reference = Some(dates),
            }
        }

        Ok(Self { symbol, channels })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn channel(&self, channel: Channel) -> Option<&TimeSeries> {
        self.channels.get(&channel)
    }

    /// Number of aligned rows.
    pub fn len(&self) -> usize {
        self.channels.values().next().map_or(0, TimeSeries::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn latest(&self, channel: Channel) -> Option<f64> {
        self.channel(channel)
            .and_then(|s| s.last())
            .and_then(|p| p.value)
    }

    /// Value one row before the latest; the latest itself when only one row exists.
    pub fn previous(&self, channel: Channel) -> Option<f64> {
        let series = self.channel(channel)?;
        match series.len() {
            0 => None,
            1 => series.value_at(0),
            n => series.value_at(n - 2),
        }
    }
}

/// Inner-join one symbol's five channels on date. Rows where any channel is
/// absent or missing are dropped; no forward fill. A symbol absent from any
/// channel yields an empty record.
pub fn assemble_record(symbol: &str, panel: &MarketPanel) -> SymbolRecord {
    let mut lookups: Vec<HashMap<NaiveDate, f64>> = Vec::with_capacity(Channel::ALL.len());
    for channel in Channel::ALL {
        let Some(series) = panel.series(channel, symbol) else {
            return SymbolRecord::empty(symbol);
        };
        lookups.push(
            series
                .points()
                .iter()
                .filter_map(|p| p.value.map(|v| (p.date, v)))
                .collect(),
        );
    }

    let mut dates: Vec<NaiveDate> = lookups[0]
        .keys()
        .filter(|d| lookups.iter().all(|l| l.contains_key(d)))
        .copied()
        .collect();
    dates.sort();

    let channels = Channel::ALL
        .into_iter()
        .zip(&lookups)
        .map(|(channel, lookup)| {
            let series =
                TimeSeries::from_unsorted(dates.iter().map(|d| (*d, lookup.get(d).copied())));
            (channel, series)
        })
        .collect();

    SymbolRecord {
        symbol: symbol.to_string(),
        channels,
    }
}
