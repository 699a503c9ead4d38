//! Paper trading: a live session against a [`ReplayVenue`] whose clock is
//! advanced by a background thread.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info};
use tradeloop_core::domain::PriceSeries;
use tradeloop_core::execution::{ExecutionVenue, ReplayVenue};

use super::session::{sleep_while_running, LiveSession, SessionSummary};
use super::LiveError;
use crate::config::RunConfig;

/// Replay venue over `series`, each symbol's clock starting where a full
/// `live.history_bars` window is available.
pub fn build_replay_venue(config: &RunConfig, series: Vec<PriceSeries>) -> ReplayVenue {
    let start = config.live.history_bars.saturating_sub(1);
    series.into_iter().fold(ReplayVenue::new(), |venue, s| {
        match config.symbol(s.symbol()) {
            Some(sym) => venue.with_symbol(sym.profile(), s, sym.spread, start),
            None => venue,
        }
    })
}

/// Run a paper session until the replay data is exhausted (or the account
/// is ruined). The clock advances every symbol by one bar per `step`.
pub fn run_paper(
    config: &RunConfig,
    series: Vec<PriceSeries>,
    step: Duration,
) -> Result<SessionSummary, LiveError> {
    let venue = Arc::new(build_replay_venue(config, series));
    let dyn_venue: Arc<dyn ExecutionVenue> = venue.clone();
    let session = LiveSession::from_config(config, dyn_venue, DateTime::<Utc>::MIN_UTC)?;
    let stop = session.stop_handle();
    let reporter = session.reporter();

    let clock = {
        let (venue, stop) = (Arc::clone(&venue), Arc::clone(&stop));
        thread::Builder::new()
            .name("replay-clock".to_string())
            .spawn(move || {
                loop {
                    sleep_while_running(&stop, step);
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    if !venue.step_all() {
                        info!("replay data exhausted");
                        stop.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            })
            .map_err(|e| LiveError::Spawn(format!("replay-clock: {e}")))?
    };

    let result = session.run();
    stop.store(true, Ordering::SeqCst);
    if clock.join().is_err() {
        error!("replay clock panicked");
    }
    let mut summary = result?;

    if config.mark_to_market_close {
        let forced = venue.close_all();
        if reporter.record(forced) > 0 {
            summary = SessionSummary::from_reporter(&reporter);
            info!(trades = summary.report.total_trades, "open positions force-closed at session end");
        }
    }
    Ok(summary)
}
