//! Signal sources — strategies that look at a bar window and a quote and
//! may propose one order.
//!
//! Sources never see the ledger or the account. They answer "would I trade
//! here, and with which levels?" and nothing else. Routing, normalization and
//! the one-position-per-symbol rule belong to the engine or the live worker.

pub mod breakout;
pub mod fakeout;
pub mod ma_crossover;
pub mod registry;

pub use breakout::Breakout;
pub use fakeout::Fakeout;
pub use ma_crossover::MaCrossover;
pub use registry::{RegistryError, SourceFactory, StrategyRegistry};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Direction, OrderIntent, Tick};

/// Strategy capability: `(bar window, tick) → OrderIntent?`.
///
/// # Invariants
/// - `check_signal()` is pure in `bars`, `tick` and the source's configuration.
/// - Too little history is "no signal", never an error.
/// - The last bar of `bars` is the current bar.
pub trait SignalSource: Send + Sync {
    /// Registry name, recorded on every position the source opens.
    fn name(&self) -> &str;

    /// Bars needed before the source can produce output.
    fn warmup_bars(&self) -> usize;

    fn check_signal(&self, bars: &[Bar], tick: &Tick) -> Option<OrderIntent>;
}

// ─── Aggression ──────────────────────────────────────────────────────

/// How eagerly sources with a confirmation count commit to a setup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggression {
    Low,
    #[default]
    Medium,
    High,
}

impl Aggression {
    /// Confirmation bars to require given a configured base count.
    pub fn confirmation_bars(&self, base: usize) -> usize {
        match self {
            Aggression::High => 1,
            Aggression::Medium => base,
            Aggression::Low => base + 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Aggression::Low => "low",
            Aggression::Medium => "medium",
            Aggression::High => "high",
        }
    }
}

impl fmt::Display for Aggression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Aggression::Low),
            "medium" => Ok(Aggression::Medium),
            "high" => Ok(Aggression::High),
            other => Err(format!("unknown aggression level '{other}'")),
        }
    }
}

// ─── Parameters ──────────────────────────────────────────────────────

/// Upper bound on any bar-count parameter.
pub const MAX_PERIOD: usize = 1_000_000;

/// Numeric strategy parameters keyed by name. Missing keys take the source's default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyParams(BTreeMap<String, f64>);

impl StrategyParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn raw(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Named f64 parameter, falling back to `default`.
    pub fn param(&self, name: &str, default: f64) -> f64 {
        self.raw(name).unwrap_or(default)
    }

    /// Named bar count for `strategy`, falling back to `default`.
    ///
    /// The value must be a whole number in `1..=MAX_PERIOD`.
    pub fn param_usize(
        &self,
        strategy: &str,
        name: &str,
        default: usize,
    ) -> Result<usize, RegistryError> {
        let Some(v) = self.raw(name) else {
            return Ok(default);
        };
        if !v.is_finite() || v.fract() != 0.0 {
            return Err(RegistryError::invalid(
                strategy,
                name,
                format!("{v} is not a whole number of bars"),
            ));
        }
        if v < 1.0 || v > MAX_PERIOD as f64 {
            return Err(RegistryError::invalid(
                strategy,
                name,
                format!("{v} is outside 1..={MAX_PERIOD}"),
            ));
        }
        Ok(v as usize)
    }

    /// Named flag: any non-zero value is true.
    pub fn param_bool(&self, name: &str, default: bool) -> bool {
        self.raw(name).map(|v| v != 0.0).unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, f64>> for StrategyParams {
    fn from(map: BTreeMap<String, f64>) -> Self {
        Self(map)
    }
}

// ─── Shared helpers ──────────────────────────────────────────────────

/// SL/TP placed `atr × multiplier` away from `reference` on the correct sides.
pub fn atr_levels(
    direction: Direction,
    reference: f64,
    atr: f64,
    sl_mult: f64,
    tp_mult: f64,
) -> (f64, f64) {
    let s = direction.sign();
    (reference - s * atr * sl_mult, reference + s * atr * tp_mult)
}

/// SL/TP placed a fixed fraction of `reference` away on the correct sides.
pub fn percent_levels(
    direction: Direction,
    reference: f64,
    sl_pct: f64,
    tp_pct: f64,
) -> (f64, f64) {
    let s = direction.sign();
    (reference * (1.0 - s * sl_pct), reference * (1.0 + s * tp_pct))
}

/// Quote a market order fills at: ask to buy, bid to sell.
pub fn reference_price(direction: Direction, tick: &Tick) -> f64 {
    match direction {
        Direction::Long => tick.ask,
        Direction::Short => tick.bid,
    }
}

pub(crate) fn highest_high(bars: &[Bar]) -> f64 {
    bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max)
}

pub(crate) fn lowest_low(bars: &[Bar]) -> f64 {
    bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggression_adjusts_confirmation() {
        assert_eq!(Aggression::High.confirmation_bars(2), 1);
        assert_eq!(Aggression::Medium.confirmation_bars(2), 2);
        assert_eq!(Aggression::Low.confirmation_bars(2), 3);
    }

    #[test]
    fn aggression_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Aggression>().unwrap(), Aggression::High);
        assert!("reckless".parse::<Aggression>().is_err());
        let json = serde_json::to_string(&Aggression::Low).unwrap();
        assert_eq!(json, "\"low\"");
    }

    #[test]
    fn params_fall_back_to_defaults() {
        let p = StrategyParams::new().with("lookback", 20.0).with("validate_candle", 0.0);
        assert_eq!(p.param_usize("breakout", "lookback", 100).unwrap(), 20);
        assert_eq!(p.param_usize("breakout", "confirmation", 2).unwrap(), 2);
        assert_eq!(p.param("sl_mult", 1.5), 1.5);
        assert!(!p.param_bool("validate_candle", true));
        assert!(p.param_bool("missing", true));
    }

    #[test]
    fn bar_counts_must_be_whole_and_in_range() {
        for bad in [2.7, -3.0, 0.0, f64::NAN, f64::INFINITY, 1e30] {
            let p = StrategyParams::new().with("lookback", bad);
            let err = p.param_usize("breakout", "lookback", 100).unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidParam { ref param, .. } if param == "lookback"),
                "{bad} accepted"
            );
        }
        let p = StrategyParams::new().with("lookback", MAX_PERIOD as f64);
        assert_eq!(p.param_usize("breakout", "lookback", 100).unwrap(), MAX_PERIOD);
    }

    #[test]
    fn level_helpers_respect_direction() {
        let (sl, tp) = atr_levels(Direction::Long, 100.0, 2.0, 1.5, 3.0);
        assert_eq!((sl, tp), (97.0, 106.0));
        let (sl, tp) = atr_levels(Direction::Short, 100.0, 2.0, 1.5, 3.0);
        assert_eq!((sl, tp), (103.0, 94.0));

        let (sl, tp) = percent_levels(Direction::Long, 100.0, 0.05, 0.10);
        assert!((sl - 95.0).abs() < 1e-9 && (tp - 110.0).abs() < 1e-9);
        let (sl, tp) = percent_levels(Direction::Short, 100.0, 0.05, 0.10);
        assert!((sl - 105.0).abs() < 1e-9 && (tp - 90.0).abs() < 1e-9);
    }
}
