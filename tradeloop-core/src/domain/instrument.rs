use serde::{Deserialize, Serialize};

/// Static per-symbol trading parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentProfile {
    pub symbol: String,
    /// Decimal places the venue quotes prices with.
    pub digits: u32,
    /// Minimum price increment. Zero means unknown; such instruments cannot be traded.
    pub tick_size: f64,
    /// Minimum distance between the validation price and a stop-loss, in ticks.
    pub min_stop_ticks: u32,
    /// Units of the underlying per 1.0 of volume.
    pub contract_size: f64,
}

impl InstrumentProfile {
    pub fn new(
        symbol: impl Into<String>,
        digits: u32,
        tick_size: f64,
        min_stop_ticks: u32,
        contract_size: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            digits,
            tick_size,
            min_stop_ticks,
            contract_size,
        }
    }

    /// Quote convention for a forex pair when the venue supplies nothing better:
    /// five digits, or three for JPY crosses, with a tick of one point.
    pub fn forex_default(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        let (digits, tick_size) = if symbol.to_uppercase().contains("JPY") {
            (3, 0.001)
        } else {
            (5, 0.00001)
        };
        Self::new(symbol, digits, tick_size, 0, 1.0)
    }

    /// Whether the tick size is usable for quantization.
    pub fn has_valid_tick(&self) -> bool {
        self.tick_size.is_finite() && self.tick_size > 0.0
    }

    /// Minimum stop distance in price units.
    pub fn min_stop_distance(&self) -> f64 {
        self.min_stop_ticks as f64 * self.tick_size
    }

    /// Format a price with the instrument's digits.
    pub fn format_price(&self, price: f64) -> String {
        format!("{:.*}", self.digits as usize, price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forex_default_distinguishes_jpy() {
        let eur = InstrumentProfile::forex_default("EURUSD");
        assert_eq!(eur.digits, 5);
        assert_eq!(eur.tick_size, 0.00001);

        let jpy = InstrumentProfile::forex_default("usdjpy");
        assert_eq!(jpy.digits, 3);
        assert_eq!(jpy.tick_size, 0.001);
    }

    #[test]
    fn zero_tick_is_not_tradeable() {
        let p = InstrumentProfile::new("X", 2, 0.0, 0, 1.0);
        assert!(!p.has_valid_tick());
        let p = InstrumentProfile::new("X", 2, f64::NAN, 0, 1.0);
        assert!(!p.has_valid_tick());
    }

    #[test]
    fn min_stop_distance_is_tick_multiple() {
        let p = InstrumentProfile::new("XAUUSD", 2, 0.01, 5, 100.0);
        assert!((p.min_stop_distance() - 0.05).abs() < 1e-12);
        assert_eq!(p.format_price(1234.5), "1234.50");
    }
}
