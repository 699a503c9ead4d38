//! The execution venue capability.
//!
//! Everything a live worker needs from a broker: instrument metadata, quotes,
//! bar history, market orders with attached SL/TP, open positions and the
//! deal history. Implementations own their synchronization, so one handle is
//! shared by every worker as `Arc<dyn ExecutionVenue>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Bar, ClosedTrade, Direction, InstrumentProfile, Position, Ticket, Tick};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VenueError {
    #[error("unknown symbol '{0}'")]
    UnknownSymbol(String),

    #[error("no market data for '{0}'")]
    NoData(String),

    #[error("order for {symbol} rejected: {reason}")]
    Rejected { symbol: String, reason: String },

    #[error("venue unavailable: {0}")]
    Disconnected(String),
}

/// Market order with protective levels attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Strategy name carried as the order comment.
    pub strategy: String,
}

/// Venue confirmation of a filled market order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub ticket: Ticket,
    pub fill_price: f64,
    pub fill_time: DateTime<Utc>,
}

pub trait ExecutionVenue: Send + Sync {
    fn instrument(&self, symbol: &str) -> Result<InstrumentProfile, VenueError>;

    fn current_tick(&self, symbol: &str) -> Result<Tick, VenueError>;

    /// Up to `count` most recent bars, oldest first. The last one is the current bar.
    fn recent_bars(&self, symbol: &str, count: usize) -> Result<Vec<Bar>, VenueError>;

    /// Fill at the current ask (long) or bid (short).
    fn submit_market_order(&self, request: &OrderRequest) -> Result<OrderAck, VenueError>;

    fn open_positions(&self, symbol: &str) -> Result<Vec<Position>, VenueError>;

    /// Deals whose exit time falls in `[from, to]`.
    fn closed_deals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ClosedTrade>, VenueError>;
}
