//! Technical indicator primitives over a single [`TimeSeries`].
//!
//! Every primitive returns a series with the same dates as its input. Leading
//! points are `None` until enough history has accumulated, and the input is
//! never mutated.
//!
//! - [`sma::sma`]: simple moving average
//! - [`ema::ema`]: exponential moving average (span `n`, no bias adjustment)
//! - [`rsi::rsi`]: relative strength index over simple trailing means
//! - [`extrema::highest`] / [`extrema::lowest`]: rolling max/min

pub mod ema;
pub mod extrema;
pub mod rsi;
pub mod sma;

use crate::domain::series::TimeSeries;
use std::fmt;

pub use ema::ema;
pub use extrema::{highest, lowest};
pub use rsi::{rsi, DEFAULT_RSI_PERIOD};
pub use sma::sma;

/// Indicator identity plus parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Highest(usize),
    Lowest(usize),
}

impl IndicatorType {
    /// Names reserved for the primitives. A formula definition may not use one
    /// of these as its own name.
    pub const PRIMITIVE_NAMES: [&'static str; 5] = ["sma", "ema", "rsi", "highest", "lowest"];

    pub fn is_primitive_name(name: &str) -> bool {
        Self::PRIMITIVE_NAMES
            .iter()
            .any(|p| p.eq_ignore_ascii_case(name.trim()))
    }

    pub fn period(&self) -> usize {
        match self {
            IndicatorType::Sma(n)
            | IndicatorType::Ema(n)
            | IndicatorType::Rsi(n)
            | IndicatorType::Highest(n)
            | IndicatorType::Lowest(n) => *n,
        }
    }

    pub fn apply(&self, series: &TimeSeries) -> TimeSeries {
        match *self {
            IndicatorType::Sma(n) => sma(series, n),
            IndicatorType::Ema(n) => ema(series, n),
            IndicatorType::Rsi(n) => rsi(series, n),
            IndicatorType::Highest(n) => highest(series, n),
            IndicatorType::Lowest(n) => lowest(series, n),
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            IndicatorType::Sma(_) => "SMA",
            IndicatorType::Ema(_) => "EMA",
            IndicatorType::Rsi(_) => "RSI",
            IndicatorType::Highest(_) => "HIGHEST",
            IndicatorType::Lowest(_) => "LOWEST",
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.keyword(), self.period())
    }
}

/// Trailing-window reduction shared by the window-based primitives. The
/// reducer only sees complete windows with every value present.
pub(crate) fn rolling<F>(series: &TimeSeries, window: usize, reduce: F) -> TimeSeries
where
    F: Fn(&[f64]) -> f64,
{
    let values = series.values();
    let mut out = vec![None; values.len()];
    if window == 0 {
        return series.with_values(out);
    }

    let mut buf: Vec<f64> = Vec::with_capacity(window);
    for i in (window - 1)..values.len() {
        buf.clear();
        for v in &values[i + 1 - window..=i] {
            match v {
                Some(x) => buf.push(*x),
                None => break,
            }
        }
        if buf.len() == window {
            out[i] = Some(reduce(&buf));
        }
    }

    series.with_values(out)
}
