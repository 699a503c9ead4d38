//! Backtest runner — wires config, bar loading, the engine and metrics.
//!
//! Two entry points:
//! - `run_backtest()`: loads every symbol's bar file, then runs. Used by CLI.
//! - `run_backtest_from_data()`: takes pre-loaded series. Used by tests and
//!   anything that builds bars in memory.
//!
//! Bars of all symbols are merged into one timestamp-ordered walk over a
//! shared account.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use tradeloop_core::domain::{BarOpen, ClosedTrade, Position, PriceSeries};
use tradeloop_core::engine::{EngineError, SimulationEngine};
use tradeloop_core::signals::{RegistryError, SignalSource, StrategyRegistry};

use crate::config::{ConfigError, RunConfig, RunId};
use crate::data_loader::{load_price_series, LoadError};
use crate::metrics::PerformanceReport;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("strategy error: {0}")]
    Strategy(#[from] RegistryError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("symbol '{0}' has no data file configured")]
    NoDataFile(String),
    #[error("symbol '{0}' not found in loaded data")]
    SymbolNotFound(String),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub report: PerformanceReport,
    pub trades: Vec<ClosedTrade>,
    /// Positions left open at end of data (only when mark-to-market is off).
    pub open_positions: Vec<Position>,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub ruined: bool,
    pub symbols: Vec<String>,
    pub strategies: Vec<String>,
    pub bar_count: usize,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Instantiate the configured strategies in priority order.
pub fn build_sources(config: &RunConfig) -> Result<Vec<Box<dyn SignalSource>>, RegistryError> {
    let registry = StrategyRegistry::builtin();
    config
        .strategies
        .iter()
        .map(|s| registry.create(&s.name, &s.params, config.aggression))
        .collect()
}

/// Run a backtest, loading each symbol's bar file.
pub fn run_backtest(config: &RunConfig) -> Result<BacktestResult, RunError> {
    let mut series = Vec::with_capacity(config.symbols.len());
    for symbol in &config.symbols {
        let path = symbol
            .data
            .as_deref()
            .ok_or_else(|| RunError::NoDataFile(symbol.symbol.clone()))?;
        let loaded = load_price_series(path, &symbol.symbol)?;
        info!(
            symbol = %symbol.symbol,
            bars = loaded.series.len(),
            path = %path.display(),
            "bars loaded"
        );
        series.push(loaded.series);
    }
    run_backtest_from_data(config, series)
}

/// Run a backtest over pre-loaded series. Every series must belong to a
/// configured symbol.
pub fn run_backtest_from_data(
    config: &RunConfig,
    series: Vec<PriceSeries>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let run_id = config.run_id()?;
    for s in &series {
        if config.symbol(s.symbol()).is_none() {
            return Err(RunError::SymbolNotFound(s.symbol().to_string()));
        }
    }

    let sources = build_sources(config)?;
    let strategies: Vec<String> = sources.iter().map(|s| s.name().to_string()).collect();
    let mut engine = SimulationEngine::new(
        config.initial_balance,
        sources,
        config.symbols.iter().map(|s| s.setup()),
    );

    info!(
        run_id = %&run_id[..12],
        symbols = series.len(),
        strategies = ?strategies,
        aggression = %config.aggression,
        "backtest started"
    );

    // (timestamp, series index, bar index): one merged clock for all symbols.
    let mut events: Vec<(chrono::DateTime<chrono::Utc>, usize, usize)> = series
        .iter()
        .enumerate()
        .flat_map(|(si, s)| s.bars().iter().enumerate().map(move |(bi, b)| (b.timestamp, si, bi)))
        .collect();
    events.sort();
    let bar_count = events.len();

    for (_, si, bi) in events {
        let bars = series[si].bars();
        let next_open = bars.get(bi + 1).map(BarOpen::of);
        engine.advance(bars[bi].clone(), next_open)?;

        let ledger = engine.ledger();
        if ledger.is_ruined() && ledger.open_count() == 0 {
            warn!(run_id = %&run_id[..12], "account ruined, stopping walk");
            break;
        }
    }

    if config.mark_to_market_close {
        let forced = engine.finish();
        if !forced.is_empty() {
            info!(count = forced.len(), "open positions force-closed at end of data");
        }
    }

    let ledger = engine.ledger();
    let trades = ledger.closed_trades().to_vec();
    let open_positions: Vec<Position> = ledger.open_positions().cloned().collect();
    let report = PerformanceReport::compute(&trades);

    info!(
        trades = report.total_trades,
        total_pnl = report.total_pnl,
        balance = ledger.account().balance(),
        ruined = ledger.is_ruined(),
        "backtest finished"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        report,
        trades,
        open_positions,
        initial_balance: config.initial_balance,
        final_balance: ledger.account().balance(),
        ruined: ledger.is_ruined(),
        symbols: series.iter().map(|s| s.symbol().to_string()).collect(),
        strategies,
        bar_count,
    })
}
