//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR here is the simple rolling mean of TR over `period` bars, evaluated
//! at the last bar of the window.

use crate::domain::Bar;

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let hl = bar.high - bar.low;
        if i == 0 {
            tr.push(hl);
            continue;
        }
        let pc = bars[i - 1].close;
        tr.push(hl.max((bar.high - pc).abs()).max((bar.low - pc).abs()));
    }
    tr
}

/// ATR at the last bar of `bars`: mean of the last `period` true ranges.
///
/// `None` when the window is shorter than `period`, `period` is zero, or the
/// result is not finite. A zero ATR is returned as `Some(0.0)`; callers decide
/// how to treat it.
pub fn average_true_range(bars: &[Bar], period: usize) -> Option<f64> {
    let n = bars.len();
    if period == 0 || n < period {
        return None;
    }
    // One extra bar supplies the previous close for the first TR in the window.
    let start = (n - period).saturating_sub(1);
    let tr = true_range(&bars[start..]);
    let tail = &tr[tr.len() - period..];
    let atr = tail.iter().sum::<f64>() / period as f64;
    atr.is_finite().then_some(atr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use chrono::TimeZone;

    fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                symbol: "TEST".to_string(),
                timestamp: base + chrono::Duration::hours(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn true_range_basic() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 105-95 = 10
            (102.0, 108.0, 100.0, 106.0), // TR = max(8, |108-102|, |100-102|) = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = max(9, |107-106|, |98-106|) = 9
        ]);
        let tr = true_range(&bars);
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bars = make_ohlc_bars(&[
            (98.0, 102.0, 97.0, 100.0),
            (110.0, 115.0, 108.0, 112.0), // TR = max(7, |115-100|, |108-100|) = 15
        ]);
        let tr = true_range(&bars);
        assert_approx(tr[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_is_simple_mean_of_last_period() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 10
            (102.0, 108.0, 100.0, 106.0), // TR = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = 9
            (99.0, 103.0, 97.0, 101.0),   // TR = 6
            (101.0, 106.0, 100.0, 105.0), // TR = 6
        ]);
        assert_approx(average_true_range(&bars, 3).unwrap(), 7.0, DEFAULT_EPSILON);
        assert_approx(average_true_range(&bars, 5).unwrap(), 39.0 / 5.0, DEFAULT_EPSILON);
        // Window exactly `period` long: first TR falls back to high-low.
        assert_approx(average_true_range(&bars[..3], 3).unwrap(), 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_undefined_on_short_window() {
        let bars = make_ohlc_bars(&[(100.0, 105.0, 95.0, 102.0)]);
        assert!(average_true_range(&bars, 14).is_none());
        assert!(average_true_range(&bars, 0).is_none());
    }

    #[test]
    fn atr_of_flat_bars_is_zero() {
        let bars = make_ohlc_bars(&[(1.0, 1.0, 1.0, 1.0); 5]);
        assert_eq!(average_true_range(&bars, 3), Some(0.0));
    }
}
