//! Rolling extrema: HIGHEST(n) and LOWEST(n) over the trailing n points.

use crate::domain::indicator::rolling;
use crate::domain::series::TimeSeries;

pub fn highest(series: &TimeSeries, period: usize) -> TimeSeries {
    rolling(series, period, |window| {
        window.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

pub fn lowest(series: &TimeSeries, period: usize) -> TimeSeries {
    rolling(series, period, |window| {
        window.iter().copied().fold(f64::INFINITY, f64::min)
    })
}
