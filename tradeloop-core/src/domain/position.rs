use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bar::Bar;
use super::ids::Ticket;
use super::order::Direction;
use super::trade::{CloseReason, ClosedTrade};

/// An open position. Owned by the ledger from creation until it closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticket: Ticket,
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub entry_time: DateTime<Utc>,
    pub contract_size: f64,
    /// Signal source that opened the position.
    pub strategy: String,
}

impl Position {
    /// Realized profit if the position were closed at `exit_price`.
    pub fn profit_at(&self, exit_price: f64) -> f64 {
        self.direction.sign() * (exit_price - self.entry_price) * self.contract_size * self.volume
    }

    /// Exit this bar triggers, if any, as `(reason, exit price)`.
    ///
    /// The intrabar path is unknown, so a bar that spans both levels is
    /// resolved against the position: the stop is checked first.
    pub fn exit_on(&self, bar: &Bar) -> Option<(CloseReason, f64)> {
        let (stop_hit, target_hit) = match self.direction {
            Direction::Long => (bar.low <= self.stop_loss, bar.high >= self.take_profit),
            Direction::Short => (bar.high >= self.stop_loss, bar.low <= self.take_profit),
        };
        if stop_hit {
            Some((CloseReason::StopLoss, self.stop_loss))
        } else if target_hit {
            Some((CloseReason::TakeProfit, self.take_profit))
        } else {
            None
        }
    }

    /// Convert into the single closed-trade record this position becomes.
    pub fn close(
        self,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: CloseReason,
    ) -> ClosedTrade {
        let profit = self.profit_at(exit_price);
        ClosedTrade {
            ticket: self.ticket,
            symbol: self.symbol,
            direction: self.direction,
            volume: self.volume,
            entry_price: self.entry_price,
            exit_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            entry_time: self.entry_time,
            exit_time,
            reason,
            profit,
            strategy: self.strategy,
        }
    }
}
