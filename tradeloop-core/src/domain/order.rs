//! Direction and OrderIntent — what a signal source asks the engine to do.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short. Multiplies a price move into a P/L sign.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to open a position, produced and consumed within one cycle.
///
/// Prices are what the strategy asked for. The engine normalizes the SL/TP
/// pair and decides the actual fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Name of the signal source that produced the intent.
    pub source: String,
}

impl OrderIntent {
    pub fn new(
        direction: Direction,
        entry_price: f64,
        stop_loss: f64,
        take_profit: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            direction,
            entry_price,
            stop_loss,
            take_profit,
            source: source.into(),
        }
    }
}
