//! RSI (Relative Strength Index).
//!
//! Deltas d[i] = x[i] - x[i-1] split into gains max(d, 0) and losses
//! max(-d, 0), each averaged with a simple trailing mean over `period` deltas.
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0 the ratio is undefined and so is the point: no signal,
//! rather than a clamp to 100.
//!
//! Warmup: first `period` points are undefined (need `period` deltas).

use crate::domain::indicator::rolling;
use crate::domain::series::TimeSeries;

pub const DEFAULT_RSI_PERIOD: usize = 14;

fn mean(window: &[f64]) -> f64 {
    window.iter().sum::<f64>() / window.len() as f64
}

pub fn rsi(series: &TimeSeries, period: usize) -> TimeSeries {
    let values = series.values();
    let deltas: Vec<Option<f64>> = (0..values.len())
        .map(|i| match (i.checked_sub(1).and_then(|p| values[p]), values[i]) {
            (Some(prev), Some(curr)) => Some(curr - prev),
            _ => None,
        })
        .collect();

    let gains = series.with_values(deltas.iter().map(|d| d.map(|x| x.max(0.0))).collect());
    let losses = series.with_values(deltas.iter().map(|d| d.map(|x| (-x).max(0.0))).collect());

    let avg_gain = rolling(&gains, period, mean);
    let avg_loss = rolling(&losses, period, mean);

    let out = avg_gain
        .values()
        .into_iter()
        .zip(avg_loss.values())
        .map(|(gain, loss)| match (gain, loss) {
            (Some(g), Some(l)) if l > 0.0 => Some(100.0 - 100.0 / (1.0 + g / l)),
            _ => None,
        })
        .collect();

    series.with_values(out)
}
