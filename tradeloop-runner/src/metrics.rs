//! Performance metrics — pure functions over the closed-trade history.
//!
//! Every metric takes trades (or their profits) in close order and returns a
//! scalar. No dependency on the engine, the venue or the data pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use tradeloop_core::domain::ClosedTrade;

/// Reported instead of infinity when there are no losing trades.
pub const PROFIT_FACTOR_CAP: f64 = 999.0;

/// Aggregate performance of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Fraction of winning trades, 0.0..=1.0.
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_win: f64,
    /// Mean profit of non-winning trades (zero or negative).
    pub avg_loss: f64,
    /// Largest peak-to-trough fall of cumulative P/L, in account currency.
    pub max_drawdown: f64,
    pub profit_factor: f64,
}

impl PerformanceReport {
    /// Compute the report from trades in close order.
    pub fn compute(trades: &[ClosedTrade]) -> Self {
        let profits: Vec<f64> = trades.iter().map(|t| t.profit).collect();
        Self::from_profits(&profits)
    }

    pub fn from_profits(profits: &[f64]) -> Self {
        let wins = profits.iter().filter(|p| **p > 0.0).count();
        Self {
            total_trades: profits.len(),
            wins,
            losses: profits.len() - wins,
            win_rate: win_rate(profits),
            total_pnl: profits.iter().sum(),
            avg_win: average_win(profits),
            avg_loss: average_loss(profits),
            max_drawdown: max_drawdown(profits),
            profit_factor: profit_factor(profits),
        }
    }
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(45);
        writeln!(f, "{rule}")?;
        writeln!(f, "{:^45}", "PERFORMANCE REPORT")?;
        writeln!(f, "{rule}")?;
        if self.total_trades == 0 {
            writeln!(f, "| No closed trades yet.")?;
            return write!(f, "{rule}");
        }
        writeln!(f, "| Total trades  : {}", self.total_trades)?;
        writeln!(f, "| Wins          : {}", self.wins)?;
        writeln!(f, "| Losses        : {}", self.losses)?;
        writeln!(f, "| Win rate      : {:.2} %", self.win_rate * 100.0)?;
        writeln!(f, "{}", "-".repeat(45))?;
        writeln!(f, "| Total P/L     : {:.2}", self.total_pnl)?;
        writeln!(f, "| Avg win       : {:.2}", self.avg_win)?;
        writeln!(f, "| Avg loss      : {:.2}", self.avg_loss)?;
        writeln!(f, "| Max drawdown  : {:.2}", self.max_drawdown)?;
        writeln!(f, "| Profit factor : {:.2}", self.profit_factor)?;
        write!(f, "{rule}")
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Running sum of profits, one point per trade.
pub fn cumulative_pnl(profits: &[f64]) -> Vec<f64> {
    profits
        .iter()
        .scan(0.0, |acc, p| {
            *acc += p;
            Some(*acc)
        })
        .collect()
}

/// Fraction of trades with profit > 0.
pub fn win_rate(profits: &[f64]) -> f64 {
    if profits.is_empty() {
        return 0.0;
    }
    let wins = profits.iter().filter(|p| **p > 0.0).count();
    wins as f64 / profits.len() as f64
}

/// Mean profit of trades with profit > 0, or 0.0 if there are none.
pub fn average_win(profits: &[f64]) -> f64 {
    mean(profits.iter().copied().filter(|p| *p > 0.0))
}

/// Mean profit of trades with profit <= 0, or 0.0 if there are none.
pub fn average_loss(profits: &[f64]) -> f64 {
    mean(profits.iter().copied().filter(|p| *p <= 0.0))
}

/// Max of running-peak minus value over the cumulative P/L, starting from 0.
pub fn max_drawdown(profits: &[f64]) -> f64 {
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for value in cumulative_pnl(profits) {
        peak = peak.max(value);
        max_dd = max_dd.max(peak - value);
    }
    max_dd
}

/// Gross profit / gross loss. [`PROFIT_FACTOR_CAP`] when nothing was lost,
/// 0.0 when there are no trades.
pub fn profit_factor(profits: &[f64]) -> f64 {
    if profits.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = profits.iter().filter(|p| **p > 0.0).sum();
    let gross_loss: f64 = profits.iter().filter(|p| **p <= 0.0).sum::<f64>().abs();
    if gross_loss == 0.0 {
        return PROFIT_FACTOR_CAP;
    }
    gross_profit / gross_loss
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
