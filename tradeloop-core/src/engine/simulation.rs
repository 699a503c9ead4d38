//! SimulationEngine — drives signal sources and the ledger one bar at a time.
//!
//! The caller feeds bars in increasing time order per symbol, together with
//! the open of the following bar. Entries are decided on the closed bar and
//! filled at that next open, so no decision sees a price it could not have
//! seen live.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{Bar, BarError, BarOpen, ClosedTrade, CloseReason, InstrumentProfile, Tick};
use crate::execution::normalize;
use crate::signals::SignalSource;

use super::ledger::{LedgerError, NewPosition, PositionLedger};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("malformed bar: {0}")]
    Data(#[from] BarError),

    #[error("{symbol}: next open {price} at {timestamp} is not a valid fill")]
    InvalidNextOpen {
        symbol: String,
        price: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    #[error("symbol '{0}' is not configured")]
    UnknownSymbol(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Static per-symbol configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSetup {
    pub profile: InstrumentProfile,
    pub volume: f64,
}

#[derive(Debug)]
struct SymbolState {
    setup: SymbolSetup,
    history: Vec<Bar>,
}

pub struct SimulationEngine {
    sources: Vec<Box<dyn SignalSource>>,
    symbols: BTreeMap<String, SymbolState>,
    ledger: PositionLedger,
}

impl SimulationEngine {
    /// `sources` are queried in the given order; the first intent wins.
    pub fn new(
        initial_balance: f64,
        sources: Vec<Box<dyn SignalSource>>,
        setups: impl IntoIterator<Item = SymbolSetup>,
    ) -> Self {
        let symbols = setups
            .into_iter()
            .map(|setup| {
                (
                    setup.profile.symbol.clone(),
                    SymbolState {
                        setup,
                        history: Vec::new(),
                    },
                )
            })
            .collect();
        Self {
            sources,
            symbols,
            ledger: PositionLedger::new(initial_balance),
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Bars consumed so far for `symbol`.
    pub fn history(&self, symbol: &str) -> Option<&[Bar]> {
        self.symbols.get(symbol).map(|s| s.history.as_slice())
    }

    /// Consume one closed bar. `next_open` is absent on the symbol's last bar.
    ///
    /// Returns the trades this bar closed. A malformed bar is rejected before
    /// any state changes.
    pub fn advance(
        &mut self,
        bar: Bar,
        next_open: Option<BarOpen>,
    ) -> Result<Vec<ClosedTrade>, EngineError> {
        let state = self
            .symbols
            .get_mut(&bar.symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(bar.symbol.clone()))?;

        bar.validate()?;
        if let Some(prev) = state.history.last() {
            if bar.timestamp <= prev.timestamp {
                return Err(BarError::NonMonotonic {
                    symbol: bar.symbol.clone(),
                    previous: prev.timestamp,
                    timestamp: bar.timestamp,
                }
                .into());
            }
        }
        if let Some(open) = next_open {
            if !(open.price.is_finite() && open.price > 0.0) || open.timestamp <= bar.timestamp {
                return Err(EngineError::InvalidNextOpen {
                    symbol: bar.symbol.clone(),
                    price: open.price,
                    timestamp: open.timestamp,
                });
            }
        }

        state.history.push(bar);
        let bar = &state.history[state.history.len() - 1];

        let mut closed = Vec::new();
        if let Some(trade) = self.ledger.check_exits(bar) {
            closed.push(trade);
        }

        let Some(open) = next_open else {
            return Ok(closed);
        };
        if self.ledger.has_position(&bar.symbol) || self.ledger.is_ruined() {
            return Ok(closed);
        }

        let tick = Tick::from_bar(bar);
        let Some(intent) = self
            .sources
            .iter()
            .find_map(|source| source.check_signal(&state.history, &tick))
        else {
            return Ok(closed);
        };

        let profile = &state.setup.profile;
        let levels = match normalize(
            intent.direction,
            &tick,
            intent.stop_loss,
            intent.take_profit,
            profile,
        ) {
            Ok(levels) => levels,
            Err(err) => {
                info!(
                    symbol = %bar.symbol,
                    strategy = %intent.source,
                    error = %err,
                    "signal dropped: levels could not be normalized"
                );
                return Ok(closed);
            }
        };
        debug!(
            symbol = %bar.symbol,
            strategy = %intent.source,
            direction = %intent.direction,
            "signal accepted"
        );

        self.ledger.open(NewPosition {
            symbol: bar.symbol.clone(),
            direction: intent.direction,
            volume: state.setup.volume,
            entry_price: open.price,
            stop_loss: levels.stop_loss_f64(),
            take_profit: levels.take_profit_f64(),
            entry_time: open.timestamp,
            contract_size: profile.contract_size,
            strategy: intent.source,
        })?;
        Ok(closed)
    }

    /// Force-close every open position at its symbol's last close.
    ///
    /// Runs even when the account is ruined. Positions whose symbol never saw a
    /// bar are left open.
    pub fn finish(&mut self) -> Vec<ClosedTrade> {
        let symbols: Vec<String> = self
            .ledger
            .open_positions()
            .map(|p| p.symbol.clone())
            .collect();
        let mut closed = Vec::new();
        for symbol in symbols {
            let Some(last) = self.symbols.get(&symbol).and_then(|s| s.history.last()) else {
                continue;
            };
            let (price, time) = (last.close, last.timestamp);
            if let Ok(trade) = self
                .ledger
                .close(&symbol, price, time, CloseReason::ForcedClose)
            {
                closed.push(trade);
            }
        }
        closed
    }
}
