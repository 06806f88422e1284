//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(x[i-n+1..=i]). Warmup: first (n-1) points are undefined,
//! as is any point whose window contains a missing value.

use crate::domain::indicator::rolling;
use crate::domain::series::TimeSeries;

pub fn sma(series: &TimeSeries, period: usize) -> TimeSeries {
    rolling(series, period, |window| {
        window.iter().sum::<f64>() / window.len() as f64
    })
}
