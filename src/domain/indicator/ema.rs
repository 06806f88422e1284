//! Exponential Moving Average.
//!
//! alpha = 2/(n+1). Seeded with the first available value, then
//! EMA[i] = alpha*x[i] + (1-alpha)*EMA[i-1]. No bias adjustment.
//! Points before the first available value are undefined; a missing value
//! after the seed repeats the previous EMA.

use crate::domain::series::TimeSeries;

pub fn ema(series: &TimeSeries, period: usize) -> TimeSeries {
    let values = series.values();
    if period == 0 {
        return series.with_values(vec![None; values.len()]);
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut state: Option<f64> = None;
    let mut out = Vec::with_capacity(values.len());

    for value in values {
        state = match (state, value) {
            (None, x) => x,
            (Some(prev), Some(x)) => Some(alpha * x + (1.0 - alpha) * prev),
            (Some(prev), None) => Some(prev),
        };
        out.push(state);
    }

    series.with_values(out)
}
