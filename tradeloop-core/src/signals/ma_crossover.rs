//! Moving average crossover — golden cross and death cross detection.
//!
//! Compares the fast and slow SMA on the two bars before the current one.
//! Fires Long when the fast MA crosses above the slow MA, Short when it
//! crosses below. SL/TP are ATR multiples from the fill quote.

use crate::domain::{Bar, Direction, OrderIntent, Tick};
use crate::indicators::{average_true_range, sma_at};

use super::registry::RegistryError;
use super::{atr_levels, reference_price, Aggression, SignalSource, StrategyParams};

#[derive(Debug, Clone, PartialEq)]
pub struct MaCrossover {
    pub fast_period: usize,
    pub slow_period: usize,
    pub atr_period: usize,
    pub sl_mult: f64,
    pub tp_mult: f64,
    pub fallback_atr_pct: f64,
}

impl MaCrossover {
    pub const NAME: &'static str = "ma_crossover";

    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self, RegistryError> {
        if fast_period == 0 {
            return Err(RegistryError::invalid(Self::NAME, "fast_period", "must be >= 1"));
        }
        if slow_period <= fast_period {
            return Err(RegistryError::invalid(
                Self::NAME,
                "slow_period",
                "must be greater than fast_period",
            ));
        }
        Ok(Self {
            fast_period,
            slow_period,
            atr_period: 14,
            sl_mult: 2.0,
            tp_mult: 4.0,
            fallback_atr_pct: 0.005,
        })
    }

    pub fn from_params(params: &StrategyParams, _aggression: Aggression) -> Result<Self, RegistryError> {
        let mut source = Self::new(
            params.param_usize(Self::NAME, "fast_period", 9)?,
            params.param_usize(Self::NAME, "slow_period", 21)?,
        )?;
        source.atr_period = params.param_usize(Self::NAME, "atr_period", 14)?;
        source.sl_mult = params.param("sl_mult", 2.0);
        source.tp_mult = params.param("tp_mult", 4.0);
        source.fallback_atr_pct = params.param("fallback_atr_pct", 0.005);
        Ok(source)
    }
}

impl SignalSource for MaCrossover {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn warmup_bars(&self) -> usize {
        self.slow_period + 2
    }

    fn check_signal(&self, bars: &[Bar], tick: &Tick) -> Option<OrderIntent> {
        let n = bars.len();
        if n < self.warmup_bars() {
            return None;
        }
        let (prev, last) = (n - 3, n - 2);
        let prev_fast = sma_at(bars, prev, self.fast_period)?;
        let prev_slow = sma_at(bars, prev, self.slow_period)?;
        let last_fast = sma_at(bars, last, self.fast_period)?;
        let last_slow = sma_at(bars, last, self.slow_period)?;

        let direction = if prev_fast < prev_slow && last_fast > last_slow {
            Direction::Long
        } else if prev_fast > prev_slow && last_fast < last_slow {
            Direction::Short
        } else {
            return None;
        };

        let atr = match average_true_range(bars, self.atr_period) {
            Some(atr) if atr > 0.0 => atr,
            _ => tick.ask * self.fallback_atr_pct,
        };
        let reference = reference_price(direction, tick);
        let (sl, tp) = atr_levels(direction, reference, atr, self.sl_mult, self.tp_mult);
        Some(OrderIntent::new(direction, reference, sl, tp, Self::NAME))
    }
}
