//! Replay venue — an in-memory broker over recorded bars.
//!
//! Each symbol has a cursor into its bar history; the cursor bar is the
//! "current" bar. Quotes are `bid = close`, `ask = close + spread`. Calling
//! [`ReplayVenue::step`] moves a symbol's clock one bar forward and settles
//! any SL/TP the new bar crosses, stop first. All state sits behind one
//! mutex, so every call is serialized.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::domain::{
    Bar, CloseReason, ClosedTrade, Direction, InstrumentProfile, Position, PriceSeries, Tick,
    TicketAllocator,
};

use super::venue::{ExecutionVenue, OrderAck, OrderRequest, VenueError};

#[derive(Debug)]
struct Feed {
    profile: InstrumentProfile,
    bars: Vec<Bar>,
    cursor: usize,
    spread: f64,
}

impl Feed {
    fn current(&self) -> &Bar {
        &self.bars[self.cursor]
    }

    fn tick(&self) -> Tick {
        let bar = self.current();
        Tick {
            timestamp: bar.timestamp,
            bid: bar.close,
            ask: bar.close + self.spread,
            last: bar.close,
        }
    }
}

#[derive(Debug, Default)]
struct ReplayState {
    feeds: BTreeMap<String, Feed>,
    positions: BTreeMap<String, Position>,
    deals: Vec<ClosedTrade>,
    tickets: TicketAllocator,
}

#[derive(Debug, Default)]
pub struct ReplayVenue {
    state: Mutex<ReplayState>,
}

impl ReplayVenue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol whose clock starts at bar index `start` (clamped to the series).
    ///
    /// Empty series are ignored.
    pub fn with_symbol(
        self,
        profile: InstrumentProfile,
        series: PriceSeries,
        spread: f64,
        start: usize,
    ) -> Self {
        if series.is_empty() {
            return self;
        }
        {
            let mut state = self.state.lock();
            let bars = series.bars().to_vec();
            let cursor = start.min(bars.len() - 1);
            state.feeds.insert(
                profile.symbol.clone(),
                Feed {
                    profile,
                    bars,
                    cursor,
                    spread: spread.max(0.0),
                },
            );
        }
        self
    }

    pub fn symbols(&self) -> Vec<String> {
        self.state.lock().feeds.keys().cloned().collect()
    }

    /// Advance one symbol's clock by a bar. Returns false once its data is exhausted.
    pub fn step(&self, symbol: &str) -> Result<bool, VenueError> {
        let mut state = self.state.lock();
        let ReplayState {
            feeds,
            positions,
            deals,
            ..
        } = &mut *state;
        let feed = feeds
            .get_mut(symbol)
            .ok_or_else(|| VenueError::UnknownSymbol(symbol.to_string()))?;
        if feed.cursor + 1 >= feed.bars.len() {
            return Ok(false);
        }
        feed.cursor += 1;
        let bar = feed.current();

        let exit = positions.get(symbol).and_then(|p| p.exit_on(bar));
        if let Some((reason, price)) = exit {
            if let Some(position) = positions.remove(symbol) {
                let deal = position.close(price, bar.timestamp, reason);
                info!(
                    symbol,
                    ticket = %deal.ticket,
                    reason = %deal.reason,
                    profit = deal.profit,
                    "replay venue closed position"
                );
                deals.push(deal);
            }
        }
        Ok(true)
    }

    /// Advance every symbol. Returns false when no symbol moved.
    pub fn step_all(&self) -> bool {
        let mut moved = false;
        for symbol in self.symbols() {
            if let Ok(true) = self.step(&symbol) {
                moved = true;
            }
        }
        moved
    }

    /// Whether every symbol is on its last bar.
    pub fn is_exhausted(&self) -> bool {
        self.state
            .lock()
            .feeds
            .values()
            .all(|f| f.cursor + 1 >= f.bars.len())
    }

    /// Close every open position at its symbol's current close.
    pub fn close_all(&self) -> Vec<ClosedTrade> {
        let mut state = self.state.lock();
        let ReplayState {
            feeds,
            positions,
            deals,
            ..
        } = &mut *state;
        let mut closed = Vec::new();
        for (symbol, position) in std::mem::take(positions) {
            let Some(feed) = feeds.get(&symbol) else {
                continue;
            };
            let bar = feed.current();
            let deal = position.close(bar.close, bar.timestamp, CloseReason::ForcedClose);
            deals.push(deal.clone());
            closed.push(deal);
        }
        closed
    }
}

impl ExecutionVenue for ReplayVenue {
    fn instrument(&self, symbol: &str) -> Result<InstrumentProfile, VenueError> {
        self.state
            .lock()
            .feeds
            .get(symbol)
            .map(|f| f.profile.clone())
            .ok_or_else(|| VenueError::UnknownSymbol(symbol.to_string()))
    }

    fn current_tick(&self, symbol: &str) -> Result<Tick, VenueError> {
        self.state
            .lock()
            .feeds
            .get(symbol)
            .map(Feed::tick)
            .ok_or_else(|| VenueError::UnknownSymbol(symbol.to_string()))
    }

    fn recent_bars(&self, symbol: &str, count: usize) -> Result<Vec<Bar>, VenueError> {
        let state = self.state.lock();
        let feed = state
            .feeds
            .get(symbol)
            .ok_or_else(|| VenueError::UnknownSymbol(symbol.to_string()))?;
        let end = feed.cursor + 1;
        let start = end.saturating_sub(count);
        Ok(feed.bars[start..end].to_vec())
    }

    fn submit_market_order(&self, request: &OrderRequest) -> Result<OrderAck, VenueError> {
        let mut state = self.state.lock();
        let ReplayState {
            feeds,
            positions,
            tickets,
            ..
        } = &mut *state;
        let symbol = request.symbol.as_str();
        let feed = feeds
            .get(symbol)
            .ok_or_else(|| VenueError::UnknownSymbol(symbol.to_string()))?;
        let reject = |reason: &str| VenueError::Rejected {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        };

        if positions.contains_key(symbol) {
            return Err(reject("position already open"));
        }
        if !(request.volume.is_finite() && request.volume > 0.0) {
            return Err(reject("invalid volume"));
        }

        let tick = feed.tick();
        let min_distance = feed.profile.min_stop_distance();
        let (fill, stops_ok) = match request.direction {
            Direction::Long => (
                tick.ask,
                request.stop_loss < tick.bid
                    && tick.bid - request.stop_loss >= min_distance - 1e-12
                    && request.take_profit > tick.ask,
            ),
            Direction::Short => (
                tick.bid,
                request.stop_loss > tick.ask
                    && request.stop_loss - tick.ask >= min_distance - 1e-12
                    && request.take_profit < tick.bid,
            ),
        };
        if !stops_ok {
            return Err(reject("invalid stops"));
        }

        let ticket = tickets.next_ticket();
        let position = Position {
            ticket,
            symbol: symbol.to_string(),
            direction: request.direction,
            volume: request.volume,
            entry_price: fill,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            entry_time: tick.timestamp,
            contract_size: feed.profile.contract_size,
            strategy: request.strategy.clone(),
        };
        debug!(symbol, %ticket, fill, "replay venue filled market order");
        positions.insert(symbol.to_string(), position);

        Ok(OrderAck {
            ticket,
            fill_price: fill,
            fill_time: tick.timestamp,
        })
    }

    fn open_positions(&self, symbol: &str) -> Result<Vec<Position>, VenueError> {
        let state = self.state.lock();
        if !state.feeds.contains_key(symbol) {
            return Err(VenueError::UnknownSymbol(symbol.to_string()));
        }
        Ok(state.positions.get(symbol).cloned().into_iter().collect())
    }

    fn closed_deals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ClosedTrade>, VenueError> {
        Ok(self
            .state
            .lock()
            .deals
            .iter()
            .filter(|d| d.exit_time >= from && d.exit_time <= to)
            .cloned()
            .collect())
    }
}
