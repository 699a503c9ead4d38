//! Live trading against an [`ExecutionVenue`](tradeloop_core::execution::ExecutionVenue).

pub mod paper;
pub mod reporter;
pub mod session;
pub mod worker;

use thiserror::Error;
use tradeloop_core::execution::VenueError;
use tradeloop_core::signals::RegistryError;

pub use paper::{build_replay_venue, run_paper};
pub use reporter::TradeReporter;
pub use session::{sleep_while_running, LiveSession, SessionSummary, WorkerSpec};
pub use worker::{CycleOutcome, SymbolWorker};

#[derive(Debug, Error)]
pub enum LiveError {
    /// The venue could not serve a symbol at startup. The session never starts.
    #[error("venue unavailable for '{symbol}': {source}")]
    Connectivity {
        symbol: String,
        #[source]
        source: VenueError,
    },

    #[error("no symbols to trade")]
    NoSymbols,

    #[error("venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("strategy error: {0}")]
    Strategy(#[from] RegistryError),

    #[error("failed to spawn thread {0}")]
    Spawn(String),
}
