//! Position ledger — open positions, closed-trade history and the account.
//!
//! Per symbol the lifecycle is `NONE → OPEN → NONE`. At most one position is
//! open per symbol, every close books its profit into the balance, and a
//! balance at or below zero marks the account ruined for good.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info};

use crate::domain::{
    AccountState, Bar, CloseReason, ClosedTrade, Direction, Position, Ticket, TicketAllocator,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("{symbol} already has open position {ticket}")]
    PositionAlreadyOpen { symbol: String, ticket: Ticket },

    #[error("account is ruined; no new positions")]
    AccountRuined,

    #[error("no open position for {0}")]
    NoOpenPosition(String),

    #[error("{symbol}: entry price {price} is not a positive finite number")]
    InvalidEntryPrice { symbol: String, price: f64 },
}

/// Everything the ledger needs to open a position except its ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPosition {
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub entry_time: DateTime<Utc>,
    pub contract_size: f64,
    pub strategy: String,
}

#[derive(Debug, Clone)]
pub struct PositionLedger {
    open: BTreeMap<String, Position>,
    closed: Vec<ClosedTrade>,
    account: AccountState,
    tickets: TicketAllocator,
}

impl PositionLedger {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            open: BTreeMap::new(),
            closed: Vec::new(),
            account: AccountState::new(initial_balance),
            tickets: TicketAllocator::new(),
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.open.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.open.contains_key(symbol)
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.open.values()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Closed trades in close order.
    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed
    }

    pub fn account(&self) -> &AccountState {
        &self.account
    }

    pub fn is_ruined(&self) -> bool {
        self.account.is_ruined()
    }

    // ─── Transitions ─────────────────────────────────────────────────

    /// `NONE → OPEN`. Refused when ruined or when the symbol already has a position.
    pub fn open(&mut self, new: NewPosition) -> Result<Ticket, LedgerError> {
        if self.account.is_ruined() {
            return Err(LedgerError::AccountRuined);
        }
        if let Some(existing) = self.open.get(&new.symbol) {
            return Err(LedgerError::PositionAlreadyOpen {
                symbol: new.symbol,
                ticket: existing.ticket,
            });
        }
        if !(new.entry_price.is_finite() && new.entry_price > 0.0) {
            return Err(LedgerError::InvalidEntryPrice {
                symbol: new.symbol,
                price: new.entry_price,
            });
        }

        let ticket = self.tickets.next_ticket();
        info!(
            symbol = %new.symbol,
            %ticket,
            direction = %new.direction,
            entry = new.entry_price,
            sl = new.stop_loss,
            tp = new.take_profit,
            strategy = %new.strategy,
            "position opened"
        );
        let position = Position {
            ticket,
            symbol: new.symbol.clone(),
            direction: new.direction,
            volume: new.volume,
            entry_price: new.entry_price,
            stop_loss: new.stop_loss,
            take_profit: new.take_profit,
            entry_time: new.entry_time,
            contract_size: new.contract_size,
            strategy: new.strategy,
        };
        self.open.insert(new.symbol, position);
        Ok(ticket)
    }

    /// Close the symbol's position if `bar` crosses its SL or TP.
    pub fn check_exits(&mut self, bar: &Bar) -> Option<ClosedTrade> {
        let (reason, price) = self.open.get(&bar.symbol)?.exit_on(bar)?;
        self.close(&bar.symbol, price, bar.timestamp, reason).ok()
    }

    /// `OPEN → NONE` at an explicit price.
    pub fn close(
        &mut self,
        symbol: &str,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: CloseReason,
    ) -> Result<ClosedTrade, LedgerError> {
        let position = self
            .open
            .remove(symbol)
            .ok_or_else(|| LedgerError::NoOpenPosition(symbol.to_string()))?;
        let trade = position.close(exit_price, exit_time, reason);
        info!(
            symbol,
            ticket = %trade.ticket,
            reason = %trade.reason,
            exit = trade.exit_price,
            profit = trade.profit,
            "position closed"
        );

        if self.account.apply_profit(trade.profit) {
            error!(
                balance = self.account.balance(),
                ticket = %trade.ticket,
                "account ruined; no further positions will be opened"
            );
        }
        self.closed.push(trade.clone());
        Ok(trade)
    }
}
