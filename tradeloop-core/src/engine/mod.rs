//! Simulation engine — the bar-by-bar driver and the position ledger.
//!
//! Per bar, in order:
//!
//! 1. Validate the bar; a malformed bar changes no state.
//! 2. Settle exits for the symbol's open position (stop before target).
//! 3. If flat and not ruined, ask the signal sources in priority order;
//!    the first intent wins.
//! 4. Normalize the intent's SL/TP and open at the next bar's open.

pub mod ledger;
pub mod simulation;

pub use ledger::{LedgerError, NewPosition, PositionLedger};
pub use simulation::{EngineError, SimulationEngine, SymbolSetup};
