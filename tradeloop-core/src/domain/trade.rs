//! ClosedTrade — the append-only record a position becomes when it closes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::Ticket;
use super::order::Direction;

/// Why a position closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    /// Mark-to-market close at end of data or session.
    ForcedClose,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::StopLoss => "STOP_LOSS",
            CloseReason::TakeProfit => "TAKE_PROFIT",
            CloseReason::ForcedClose => "FORCED_CLOSE",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete round trip: entry → exit. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    // ── Identification ──
    pub ticket: Ticket,
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,

    // ── Prices ──
    pub entry_price: f64,
    pub exit_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,

    // ── Timing ──
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,

    // ── Outcome ──
    pub reason: CloseReason,
    pub profit: f64,

    /// Signal source that opened the position.
    pub strategy: String,
}

impl ClosedTrade {
    pub fn is_winner(&self) -> bool {
        self.profit > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_trade() -> ClosedTrade {
        ClosedTrade {
            ticket: Ticket(7),
            symbol: "EURUSD".into(),
            direction: Direction::Short,
            volume: 1.0,
            entry_price: 1.1000,
            exit_price: 1.0950,
            stop_loss: 1.1050,
            take_profit: 1.0950,
            entry_time: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            exit_time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            reason: CloseReason::TakeProfit,
            profit: 500.0,
            strategy: "fakeout".into(),
        }
    }

    #[test]
    fn is_winner() {
        assert!(sample_trade().is_winner());
        let mut t = sample_trade();
        t.profit = 0.0;
        assert!(!t.is_winner());
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let trade = sample_trade();
        let json = serde_json::to_string(&trade).unwrap();
        assert!(json.contains("\"TAKE_PROFIT\""));
        let deser: ClosedTrade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, deser);
    }
}
