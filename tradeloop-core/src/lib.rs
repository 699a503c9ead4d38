//! Tradeloop Core — domain types, signal sources, price normalization, the
//! position ledger and the simulation engine.
//!
//! This crate contains the pieces shared by offline backtests and live runs:
//! - Domain types (bars, ticks, instruments, intents, positions, trades, account)
//! - Indicator helpers (true range, ATR, SMA)
//! - Signal sources and the explicit strategy registry
//! - Price normalizer with exact decimal tick quantization
//! - Position ledger with ruin detection
//! - Bar-by-bar simulation engine with next-bar-open fills
//! - The execution venue capability and an in-memory replay venue

pub mod domain;
pub mod engine;
pub mod execution;
pub mod indicators;
pub mod signals;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with live worker threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Tick>();
        require_sync::<domain::Tick>();
        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();
        require_send::<domain::InstrumentProfile>();
        require_sync::<domain::InstrumentProfile>();
        require_send::<domain::OrderIntent>();
        require_sync::<domain::OrderIntent>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::ClosedTrade>();
        require_sync::<domain::ClosedTrade>();
        require_send::<domain::AccountState>();
        require_sync::<domain::AccountState>();

        // Signal sources
        require_send::<Box<dyn signals::SignalSource>>();
        require_sync::<Box<dyn signals::SignalSource>>();
        require_send::<signals::StrategyRegistry>();
        require_sync::<signals::StrategyRegistry>();

        // Execution
        require_send::<execution::ReplayVenue>();
        require_sync::<execution::ReplayVenue>();
        require_send::<std::sync::Arc<dyn execution::ExecutionVenue>>();
        require_sync::<std::sync::Arc<dyn execution::ExecutionVenue>>();

        // Engine
        require_send::<engine::PositionLedger>();
        require_sync::<engine::PositionLedger>();
        require_send::<engine::SimulationEngine>();
    }

    /// Architecture contract: signal sources never see the ledger or account.
    ///
    /// `check_signal` takes only the bar window and a quote. Adding a ledger
    /// parameter would break this function and every implementation.
    #[test]
    fn signal_source_has_no_ledger_parameter() {
        fn _check_trait_object_builds(
            source: &dyn signals::SignalSource,
            bars: &[domain::Bar],
            tick: &domain::Tick,
        ) -> Option<domain::OrderIntent> {
            source.check_signal(bars, tick)
        }
    }
}
