//! Bar, Tick and PriceSeries — the market data units the engine consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single symbol over one fixed interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Basic OHLC sanity check: finite prices, high >= low, and open/close inside the range.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    /// Validate this bar, reporting which check failed.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.is_void() {
            return Err(BarError::NonFinitePrice {
                symbol: self.symbol.clone(),
                timestamp: self.timestamp,
            });
        }
        if !self.is_sane() {
            return Err(BarError::InconsistentRange {
                symbol: self.symbol.clone(),
                timestamp: self.timestamp,
            });
        }
        Ok(())
    }

    /// Body size as a fraction of the full high-low range (0.0 for a flat bar).
    pub fn body_ratio(&self) -> f64 {
        let range = self.high - self.low;
        if range <= 0.0 {
            return 0.0;
        }
        (self.close - self.open).abs() / range
    }

    /// Midpoint of the high-low range.
    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

/// An instantaneous quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
}

impl Tick {
    /// Synthesize a tick from a closed bar for offline simulation.
    ///
    /// The intrabar bid/ask path is unknown, so the bar extremes stand in as the
    /// worst tradeable prices: ask = high, bid = low, last = close.
    pub fn from_bar(bar: &Bar) -> Self {
        Self {
            timestamp: bar.timestamp,
            bid: bar.low,
            ask: bar.high,
            last: bar.close,
        }
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// Open of a bar: the price and time at which next-bar entries fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarOpen {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl BarOpen {
    pub fn of(bar: &Bar) -> Self {
        Self {
            timestamp: bar.timestamp,
            price: bar.open,
        }
    }
}

/// Ordered, immutable sequence of bars for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Build a series, checking every bar and strict timestamp ordering.
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, BarError> {
        let symbol = symbol.into();
        let mut previous: Option<DateTime<Utc>> = None;
        for bar in &bars {
            if bar.symbol != symbol {
                return Err(BarError::SymbolMismatch {
                    expected: symbol,
                    found: bar.symbol.clone(),
                });
            }
            bar.validate()?;
            if let Some(prev) = previous {
                if bar.timestamp <= prev {
                    return Err(BarError::NonMonotonic {
                        symbol,
                        previous: prev,
                        timestamp: bar.timestamp,
                    });
                }
            }
            previous = Some(bar.timestamp);
        }
        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("{symbol} bar at {timestamp} has a NaN or infinite price")]
    NonFinitePrice {
        symbol: String,
        timestamp: DateTime<Utc>,
    },

    #[error("{symbol} bar at {timestamp} has open/close outside its high-low range")]
    InconsistentRange {
        symbol: String,
        timestamp: DateTime<Utc>,
    },

    #[error("{symbol} bar at {timestamp} does not come after {previous}")]
    NonMonotonic {
        symbol: String,
        previous: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    #[error("bar for '{found}' in a series for '{expected}'")]
    SymbolMismatch { expected: String, found: String },
}
