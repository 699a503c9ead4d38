//! Simple Moving Average (SMA) of close prices.

use crate::domain::Bar;

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// SMA of closes over the `period` bars ending at `index` (inclusive).
pub fn sma_at(bars: &[Bar], index: usize, period: usize) -> Option<f64> {
    if period == 0 || index >= bars.len() || index + 1 < period {
        return None;
    }
    let window = &bars[index + 1 - period..=index];
    let sum: f64 = window.iter().map(|b| b.close).sum();
    Some(sum / period as f64)
}

/// Rolling SMA series aligned with `bars`. NaN until `period` bars are available.
pub fn sma_series(bars: &[Bar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut sum: f64 = bars[..period].iter().map(|b| b.close).sum();
    result[period - 1] = sum / period as f64;

    for i in period..n {
        sum += bars[i].close - bars[i - period].close;
        result[i] = sum / period as f64;
    }
    result
}
