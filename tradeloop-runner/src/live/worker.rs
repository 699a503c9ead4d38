//! One symbol's live trading cycle.
//!
//! A cycle: book any deals closed at the venue (on every symbol), skip if
//! ruined or a position is open, check the spread and the available history,
//! ask the sources in priority order, normalize the first intent and submit
//! it.

use std::sync::Arc;

use tracing::{debug, info, warn};
use tradeloop_core::domain::{InstrumentProfile, Ticket};
use tradeloop_core::execution::{normalize, ExecutionVenue, OrderRequest, VenueError};
use tradeloop_core::signals::SignalSource;

use super::reporter::TradeReporter;
use super::LiveError;
use crate::config::LiveConfig;

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The account is ruined; the worker should stop.
    Halted,
    PositionOpen,
    SpreadTooWide { spread: f64 },
    InsufficientHistory { bars: usize },
    NoSignal,
    /// Intent dropped because its levels could not be normalized.
    Dropped,
    /// The venue refused the order.
    Rejected,
    Submitted(Ticket),
}

pub struct SymbolWorker {
    symbol: String,
    volume: f64,
    profile: InstrumentProfile,
    settings: LiveConfig,
    sources: Arc<[Box<dyn SignalSource>]>,
    venue: Arc<dyn ExecutionVenue>,
    reporter: Arc<TradeReporter>,
}

impl SymbolWorker {
    pub fn new(
        profile: InstrumentProfile,
        volume: f64,
        settings: LiveConfig,
        sources: Arc<[Box<dyn SignalSource>]>,
        venue: Arc<dyn ExecutionVenue>,
        reporter: Arc<TradeReporter>,
    ) -> Self {
        Self {
            symbol: profile.symbol.clone(),
            volume,
            profile,
            settings,
            sources,
            venue,
            reporter,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn run_cycle(&mut self) -> Result<CycleOutcome, LiveError> {
        if self.reporter.is_ruined() {
            return Ok(CycleOutcome::Halted);
        }
        // Closes on any symbol count toward ruin before this worker may trade.
        let booked = self.reporter.sync(self.venue.as_ref())?;
        if booked > 0 && self.reporter.is_ruined() {
            return Ok(CycleOutcome::Halted);
        }

        if !self.venue.open_positions(&self.symbol)?.is_empty() {
            return Ok(CycleOutcome::PositionOpen);
        }

        let tick = self.venue.current_tick(&self.symbol)?;
        let spread = tick.spread();
        if spread > self.settings.max_spread_ticks * self.profile.tick_size {
            debug!(symbol = %self.symbol, spread, "spread too wide, skipping cycle");
            return Ok(CycleOutcome::SpreadTooWide { spread });
        }

        let bars = self
            .venue
            .recent_bars(&self.symbol, self.settings.history_bars)?;
        if bars.len() < self.settings.min_bars {
            debug!(symbol = %self.symbol, bars = bars.len(), "not enough history");
            return Ok(CycleOutcome::InsufficientHistory { bars: bars.len() });
        }

        let Some(intent) = self
            .sources
            .iter()
            .find_map(|source| source.check_signal(&bars, &tick))
        else {
            return Ok(CycleOutcome::NoSignal);
        };

        let levels = match normalize(
            intent.direction,
            &tick,
            intent.stop_loss,
            intent.take_profit,
            &self.profile,
        ) {
            Ok(levels) => levels,
            Err(err) => {
                info!(
                    symbol = %self.symbol,
                    strategy = %intent.source,
                    error = %err,
                    "signal dropped: levels could not be normalized"
                );
                return Ok(CycleOutcome::Dropped);
            }
        };

        let request = OrderRequest {
            symbol: self.symbol.clone(),
            direction: intent.direction,
            volume: self.volume,
            stop_loss: levels.stop_loss_f64(),
            take_profit: levels.take_profit_f64(),
            strategy: intent.source,
        };
        match self.venue.submit_market_order(&request) {
            Ok(ack) => {
                info!(
                    symbol = %self.symbol,
                    ticket = %ack.ticket,
                    strategy = %request.strategy,
                    direction = %request.direction,
                    price = ack.fill_price,
                    sl = request.stop_loss,
                    tp = request.take_profit,
                    "order filled"
                );
                Ok(CycleOutcome::Submitted(ack.ticket))
            }
            Err(err @ VenueError::Rejected { .. }) => {
                warn!(
                    symbol = %self.symbol,
                    strategy = %request.strategy,
                    error = %err,
                    "order rejected"
                );
                Ok(CycleOutcome::Rejected)
            }
            Err(err) => Err(err.into()),
        }
    }
}
