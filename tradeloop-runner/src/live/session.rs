//! Live session — one worker thread per symbol plus a reporting thread.
//!
//! Workers share the venue handle and the reporter; the only other shared
//! state is the stop flag. Every sleep is chunked so a stop request is
//! honoured within one polling interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use tradeloop_core::domain::{AccountState, ClosedTrade};
use tradeloop_core::execution::ExecutionVenue;
use tradeloop_core::signals::SignalSource;

use super::reporter::TradeReporter;
use super::worker::{CycleOutcome, SymbolWorker};
use super::LiveError;
use crate::config::{LiveConfig, RunConfig};
use crate::metrics::PerformanceReport;
use crate::runner::build_sources;

/// Longest uninterrupted sleep; bounds stop latency.
const SLEEP_CHUNK: Duration = Duration::from_millis(50);

/// Sleep up to `total`, returning early once `stop` is set.
pub fn sleep_while_running(stop: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(SLEEP_CHUNK));
    }
}

/// A symbol the session trades, with its order volume.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSpec {
    pub symbol: String,
    pub volume: f64,
}

/// Final state of a finished session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub report: PerformanceReport,
    pub trades: Vec<ClosedTrade>,
    pub account: AccountState,
}

impl SessionSummary {
    pub fn from_reporter(reporter: &TradeReporter) -> Self {
        Self {
            report: reporter.report(),
            trades: reporter.trades(),
            account: reporter.account(),
        }
    }
}

pub struct LiveSession {
    venue: Arc<dyn ExecutionVenue>,
    sources: Arc<[Box<dyn SignalSource>]>,
    specs: Vec<WorkerSpec>,
    settings: LiveConfig,
    reporter: Arc<TradeReporter>,
    stop: Arc<AtomicBool>,
}

impl LiveSession {
    pub fn new(
        venue: Arc<dyn ExecutionVenue>,
        sources: Vec<Box<dyn SignalSource>>,
        specs: Vec<WorkerSpec>,
        settings: LiveConfig,
        initial_balance: f64,
        since: DateTime<Utc>,
    ) -> Self {
        Self {
            venue,
            sources: sources.into(),
            specs,
            settings,
            reporter: Arc::new(TradeReporter::new(initial_balance, since)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build a session for every configured symbol and strategy.
    pub fn from_config(
        config: &RunConfig,
        venue: Arc<dyn ExecutionVenue>,
        since: DateTime<Utc>,
    ) -> Result<Self, LiveError> {
        let sources = build_sources(config)?;
        let specs = config
            .symbols
            .iter()
            .map(|s| WorkerSpec {
                symbol: s.symbol.clone(),
                volume: s.volume,
            })
            .collect();
        Ok(Self::new(
            venue,
            sources,
            specs,
            config.live.clone(),
            config.initial_balance,
            since,
        ))
    }

    /// Handle that stops the session when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn reporter(&self) -> Arc<TradeReporter> {
        Arc::clone(&self.reporter)
    }

    /// Run until the stop flag is set or the account is ruined, then produce
    /// the final report. Fails before any thread starts if the venue cannot
    /// serve every symbol.
    pub fn run(self) -> Result<SessionSummary, LiveError> {
        if self.specs.is_empty() {
            return Err(LiveError::NoSymbols);
        }

        let mut workers = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let profile = self
                .venue
                .instrument(&spec.symbol)
                .and_then(|p| self.venue.current_tick(&spec.symbol).map(|_| p))
                .map_err(|source| LiveError::Connectivity {
                    symbol: spec.symbol.clone(),
                    source,
                })?;
            workers.push(SymbolWorker::new(
                profile,
                spec.volume,
                self.settings.clone(),
                Arc::clone(&self.sources),
                Arc::clone(&self.venue),
                Arc::clone(&self.reporter),
            ));
        }
        self.reporter.sync(self.venue.as_ref())?;

        info!(
            workers = workers.len(),
            strategies = self.sources.len(),
            "live session started"
        );

        let poll = Duration::from_millis(self.settings.poll_interval_ms);
        let mut handles = Vec::with_capacity(workers.len() + 1);
        for worker in workers {
            let stop = Arc::clone(&self.stop);
            let name = format!("worker-{}", worker.symbol());
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(worker, &stop, poll))
                .map_err(|e| LiveError::Spawn(format!("{name}: {e}")))?;
            handles.push((name, handle));
        }

        let report_every = Duration::from_secs(self.settings.report_interval_secs);
        let (venue, reporter, stop) = (
            Arc::clone(&self.venue),
            Arc::clone(&self.reporter),
            Arc::clone(&self.stop),
        );
        let reporter_handle = thread::Builder::new()
            .name("reporter".to_string())
            .spawn(move || reporting_loop(venue.as_ref(), &reporter, &stop, report_every))
            .map_err(|e| LiveError::Spawn(format!("reporter: {e}")))?;
        handles.push(("reporter".to_string(), reporter_handle));

        // Wait for a stop request or for every worker to exit on its own.
        while !self.stop.load(Ordering::SeqCst) {
            if handles.iter().all(|(_, h)| h.is_finished()) {
                break;
            }
            thread::sleep(SLEEP_CHUNK);
        }
        self.stop.store(true, Ordering::SeqCst);
        for (name, handle) in handles {
            if handle.join().is_err() {
                error!(thread = %name, "thread panicked");
            }
        }

        if let Err(err) = self.reporter.sync(self.venue.as_ref()) {
            warn!(error = %err, "final deal sync failed");
        }
        self.reporter.log_report();
        info!("live session stopped");

        Ok(SessionSummary::from_reporter(&self.reporter))
    }
}

fn worker_loop(mut worker: SymbolWorker, stop: &AtomicBool, poll: Duration) {
    info!(symbol = %worker.symbol(), "worker started");
    while !stop.load(Ordering::SeqCst) {
        match worker.run_cycle() {
            Ok(CycleOutcome::Halted) => {
                stop.store(true, Ordering::SeqCst);
                break;
            }
            Ok(outcome) => debug!(symbol = %worker.symbol(), ?outcome, "cycle done"),
            Err(err) => error!(symbol = %worker.symbol(), error = %err, "worker cycle failed"),
        }
        sleep_while_running(stop, poll);
    }
    info!(symbol = %worker.symbol(), "worker stopped");
}

fn reporting_loop(
    venue: &dyn ExecutionVenue,
    reporter: &TradeReporter,
    stop: &AtomicBool,
    every: Duration,
) {
    info!("reporter started");
    loop {
        sleep_while_running(stop, every);
        if stop.load(Ordering::SeqCst) {
            break;
        }
        match reporter.sync(venue) {
            Ok(_) => reporter.log_report(),
            Err(err) => warn!(error = %err, "deal sync failed"),
        }
        if reporter.is_ruined() {
            stop.store(true, Ordering::SeqCst);
            break;
        }
    }
    info!("reporter stopped");
}
