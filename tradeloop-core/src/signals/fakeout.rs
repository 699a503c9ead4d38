//! False-breakout reversal.
//!
//! The bar before the current one (the signal bar) pierces the extreme of the
//! preceding `lookback` bars but closes back inside it. A pierced high is sold,
//! a pierced low is bought. The stop sits beyond the signal bar's wick.

use crate::domain::{Bar, Direction, OrderIntent, Tick};
use crate::indicators::average_true_range;

use super::registry::RegistryError;
use super::{highest_high, lowest_low, Aggression, SignalSource, StrategyParams};

#[derive(Debug, Clone, PartialEq)]
pub struct Fakeout {
    pub lookback: usize,
    pub atr_period: usize,
    pub sl_mult: f64,
    pub tp_mult: f64,
    /// ATR substitute as a fraction of the ask when the ATR is undefined or zero.
    pub fallback_atr_pct: f64,
}

impl Fakeout {
    pub const NAME: &'static str = "fakeout";

    pub fn new(lookback: usize) -> Self {
        Self {
            lookback,
            atr_period: 14,
            sl_mult: 1.2,
            tp_mult: 2.5,
            fallback_atr_pct: 0.005,
        }
    }

    pub fn default_params() -> Self {
        Self::new(50)
    }

    pub fn from_params(params: &StrategyParams, _aggression: Aggression) -> Result<Self, RegistryError> {
        let lookback = params.param_usize(Self::NAME, "lookback", 50)?;
        let mut source = Self::new(lookback);
        source.atr_period = params.param_usize(Self::NAME, "atr_period", 14)?;
        source.sl_mult = params.param("sl_mult", 1.2);
        source.tp_mult = params.param("tp_mult", 2.5);
        source.fallback_atr_pct = params.param("fallback_atr_pct", 0.005);
        Ok(source)
    }

    fn atr_or_fallback(&self, bars: &[Bar], tick: &Tick) -> f64 {
        match average_true_range(bars, self.atr_period) {
            Some(atr) if atr > 0.0 => atr,
            _ => tick.ask * self.fallback_atr_pct,
        }
    }
}

impl SignalSource for Fakeout {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn warmup_bars(&self) -> usize {
        self.lookback + 2
    }

    fn check_signal(&self, bars: &[Bar], tick: &Tick) -> Option<OrderIntent> {
        let n = bars.len();
        if n < self.warmup_bars() {
            return None;
        }
        let signal = &bars[n - 2];
        let lookback = &bars[n - 2 - self.lookback..n - 2];
        let max_high = highest_high(lookback);
        let min_low = lowest_low(lookback);

        if signal.high > max_high && signal.close < max_high {
            let atr = self.atr_or_fallback(bars, tick);
            return Some(OrderIntent::new(
                Direction::Short,
                tick.bid,
                signal.high + atr * self.sl_mult,
                tick.bid - atr * self.tp_mult,
                Self::NAME,
            ));
        }

        if signal.low < min_low && signal.close > min_low {
            let atr = self.atr_or_fallback(bars, tick);
            return Some(OrderIntent::new(
                Direction::Long,
                tick.ask,
                signal.low - atr * self.sl_mult,
                tick.ask + atr * self.tp_mult,
                Self::NAME,
            ));
        }

        None
    }
}
