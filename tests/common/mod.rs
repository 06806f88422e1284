#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use screener::domain::error::ScreenerError;
use screener::domain::formula::{ExpressionFormula, FormulaRegistry};
use screener::domain::formula_loader::{load_formulas, FormulaDefinition};
use screener::domain::ohlcv::Channel;
use screener::domain::panel::MarketPanel;
use screener::domain::ranking::ScreenReport;
use screener::domain::rule_parser;
use screener::ports::data_port::{HistoryWindow, MarketDataPort, UniversePort};
use screener::ports::report_port::ReportPort;
use std::cell::RefCell;
use std::collections::HashMap;

/// One day of prices: open, high, low, close, volume.
pub type Bar = (f64, f64, f64, f64, f64);

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn window() -> HistoryWindow {
    HistoryWindow::ending_at(date("2024-06-28"), 182).unwrap()
}

/// Consecutive daily bars starting at `start`.
pub fn dated_bars(start: &str, bars: &[Bar]) -> Vec<(NaiveDate, Bar)> {
    let start = date(start);
    bars.iter()
        .enumerate()
        .map(|(i, bar)| (start + Duration::days(i as i64), *bar))
        .collect()
}

/// Bars whose close walks linearly from `from` to `to`, opening at the
/// previous close.
pub fn trending_bars(count: usize, from: f64, to: f64, volume: f64) -> Vec<Bar> {
    let step = if count > 1 {
        (to - from) / (count - 1) as f64
    } else {
        0.0
    };
    (0..count)
        .map(|i| {
            let close = from + step * i as f64;
            let open = if i == 0 { close } else { close - step };
            (open, open.max(close) + 1.0, open.min(close) - 1.0, close, volume)
        })
        .collect()
}

pub fn flat_bars(count: usize, price: f64, volume: f64) -> Vec<Bar> {
    vec![(price, price, price, price, volume); count]
}

pub struct MockMarketData {
    pub bars: HashMap<String, Vec<(NaiveDate, Bar)>>,
    pub error: Option<String>,
    pub requested: RefCell<Vec<String>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            error: None,
            requested: RefCell::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<(NaiveDate, Bar)>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl MarketDataPort for MockMarketData {
    fn fetch_panel(
        &self,
        symbols: &[String],
        window: &HistoryWindow,
    ) -> Result<MarketPanel, ScreenerError> {
        if let Some(reason) = &self.error {
            return Err(ScreenerError::DataProvider {
                reason: reason.clone(),
            });
        }
        self.requested.borrow_mut().extend(symbols.iter().cloned());

        let mut panel = MarketPanel::new();
        for symbol in symbols {
            if let Some(bars) = self.bars.get(symbol) {
                panel.insert_bars(
                    symbol,
                    bars.iter()
                        .filter(|(d, _)| window.contains(*d))
                        .map(|(d, b)| {
                            (*d, [Some(b.0), Some(b.1), Some(b.2), Some(b.3), Some(b.4)])
                        }),
                );
            }
        }
        Ok(panel)
    }
}

pub struct MockUniverse {
    pub symbols: Vec<String>,
    pub error: Option<String>,
}

impl MockUniverse {
    pub fn new(symbols: &[&str]) -> Self {
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            error: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            symbols: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl UniversePort for MockUniverse {
    fn list_symbols(&self) -> Result<Vec<String>, ScreenerError> {
        match &self.error {
            Some(reason) => Err(ScreenerError::UniverseProvider {
                reason: reason.clone(),
            }),
            None => Ok(self.symbols.clone()),
        }
    }
}

/// Captures every report written.
#[derive(Default)]
pub struct RecordingReport {
    pub reports: RefCell<Vec<(String, ScreenReport)>>,
}

impl ReportPort for RecordingReport {
    fn write_report(&self, formula_name: &str, report: &ScreenReport) -> Result<(), ScreenerError> {
        self.reports
            .borrow_mut()
            .push((formula_name.to_string(), report.clone()));
        Ok(())
    }
}

impl RecordingReport {
    pub fn last(&self) -> ScreenReport {
        self.reports.borrow().last().unwrap().1.clone()
    }
}

pub fn expression(name: &str, channels: &[Channel], rule: &str) -> ExpressionFormula {
    ExpressionFormula::new(name, "", channels.to_vec(), rule_parser::parse(rule).unwrap()).unwrap()
}

pub fn definition(name: &str, channels: &str, rule: &str) -> FormulaDefinition {
    FormulaDefinition {
        name: name.to_string(),
        channels: Some(channels.to_string()),
        rule: Some(rule.to_string()),
        description: None,
    }
}

pub fn registry(defs: &[FormulaDefinition]) -> FormulaRegistry {
    load_formulas(defs, "test").unwrap()
}
