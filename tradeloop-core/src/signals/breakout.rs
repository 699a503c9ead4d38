//! Breakout with confirmation.
//!
//! Window layout, oldest to newest:
//!
//! ```text
//! [ lookback: L bars ][ confirmation: C bars ][ current bar ]
//! ```
//!
//! Long when every confirmation bar closes strictly above the lookback high,
//! short when every one closes strictly below the lookback low. SL/TP sit an
//! ATR multiple away from the fill quote, or a fixed percentage away when the
//! ATR is undefined or zero.

use tracing::debug;

use crate::domain::{Bar, Direction, OrderIntent, Tick};
use crate::indicators::{average_true_range, mean};

use super::registry::RegistryError;
use super::{
    atr_levels, highest_high, lowest_low, percent_levels, reference_price, Aggression,
    SignalSource, StrategyParams,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Breakout {
    pub lookback: usize,
    pub confirmation: usize,
    pub atr_period: usize,
    pub sl_mult: f64,
    pub tp_mult: f64,
    pub fallback_sl_pct: f64,
    pub fallback_tp_pct: f64,
    pub candle: Option<CandleFilter>,
}

/// Quality checks on the most recent confirmation bar.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleFilter {
    /// Minimum body / range.
    pub min_body_ratio: f64,
    /// Volume must reach this multiple of the recent mean.
    pub volume_mult: f64,
    /// Bars averaged for the volume baseline.
    pub volume_period: usize,
}

impl Default for CandleFilter {
    fn default() -> Self {
        Self {
            min_body_ratio: 0.4,
            volume_mult: 1.2,
            volume_period: 10,
        }
    }
}

impl Breakout {
    pub const NAME: &'static str = "breakout";

    pub fn new(lookback: usize, confirmation: usize) -> Self {
        Self {
            lookback,
            confirmation,
            atr_period: 14,
            sl_mult: 1.5,
            tp_mult: 3.0,
            fallback_sl_pct: 0.05,
            fallback_tp_pct: 0.10,
            candle: None,
        }
    }

    pub fn default_params() -> Self {
        Self::new(100, 2)
    }

    pub fn with_candle_filter(mut self, filter: CandleFilter) -> Self {
        self.candle = Some(filter);
        self
    }

    pub fn from_params(params: &StrategyParams, aggression: Aggression) -> Result<Self, RegistryError> {
        let lookback = params.param_usize(Self::NAME, "lookback", 100)?;
        let base = params.param_usize(Self::NAME, "confirmation", 2)?;

        let mut source = Self::new(lookback, aggression.confirmation_bars(base));
        source.atr_period = params.param_usize(Self::NAME, "atr_period", 14)?;
        source.sl_mult = params.param("sl_mult", 1.5);
        source.tp_mult = params.param("tp_mult", 3.0);
        source.fallback_sl_pct = params.param("fallback_sl_pct", 0.05);
        source.fallback_tp_pct = params.param("fallback_tp_pct", 0.10);
        if source.sl_mult <= 0.0 || source.tp_mult <= 0.0 {
            return Err(RegistryError::invalid(Self::NAME, "sl_mult/tp_mult", "must be positive"));
        }
        if params.param_bool("validate_candle", false) {
            let defaults = CandleFilter::default();
            source.candle = Some(CandleFilter {
                min_body_ratio: params.param("min_body_ratio", defaults.min_body_ratio),
                volume_mult: params.param("volume_mult", defaults.volume_mult),
                volume_period: params.param_usize(
                    Self::NAME,
                    "volume_period",
                    defaults.volume_period,
                )?,
            });
        }
        Ok(source)
    }

    /// Direction of a confirmed breakout at the end of `bars`, if any.
    fn confirmed_direction(&self, bars: &[Bar]) -> Option<Direction> {
        let n = bars.len();
        if n < self.warmup_bars() {
            return None;
        }
        let confirm_start = n - 1 - self.confirmation;
        let lookback = &bars[confirm_start - self.lookback..confirm_start];
        let confirm = &bars[confirm_start..n - 1];

        let high = highest_high(lookback);
        let low = lowest_low(lookback);
        if confirm.iter().all(|b| b.close > high) {
            Some(Direction::Long)
        } else if confirm.iter().all(|b| b.close < low) {
            Some(Direction::Short)
        } else {
            None
        }
    }

    /// Whether the last confirmation bar passes the candle filter.
    fn candle_is_valid(filter: &CandleFilter, bars: &[Bar], direction: Direction) -> bool {
        let idx = bars.len() - 2;
        let candle = &bars[idx];

        if candle.high > candle.low && candle.body_ratio() < filter.min_body_ratio {
            debug!(symbol = %candle.symbol, "breakout rejected: body too small");
            return false;
        }

        let volumes: Vec<f64> = bars[idx.saturating_sub(filter.volume_period)..idx]
            .iter()
            .map(|b| b.volume)
            .collect();
        if let Some(avg) = mean(&volumes) {
            if candle.volume < avg * filter.volume_mult {
                debug!(symbol = %candle.symbol, "breakout rejected: volume too low");
                return false;
            }
        }

        let mid = candle.midpoint();
        let weak_close = match direction {
            Direction::Long => candle.close < mid,
            Direction::Short => candle.close > mid,
        };
        if weak_close {
            debug!(symbol = %candle.symbol, "breakout rejected: weak close");
            return false;
        }
        true
    }
}

impl SignalSource for Breakout {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn warmup_bars(&self) -> usize {
        self.lookback + self.confirmation + 1
    }

    fn check_signal(&self, bars: &[Bar], tick: &Tick) -> Option<OrderIntent> {
        let direction = self.confirmed_direction(bars)?;

        if let Some(filter) = &self.candle {
            if !Self::candle_is_valid(filter, bars, direction) {
                return None;
            }
        }

        let reference = reference_price(direction, tick);
        let (sl, tp) = match average_true_range(bars, self.atr_period) {
            Some(atr) if atr > 0.0 => atr_levels(direction, reference, atr, self.sl_mult, self.tp_mult),
            _ => percent_levels(direction, reference, self.fallback_sl_pct, self.fallback_tp_pct),
        };

        Some(OrderIntent::new(direction, reference, sl, tp, Self::NAME))
    }
}
