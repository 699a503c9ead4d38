//! Tradeloop Runner — backtest orchestration, reporting and live sessions.
//!
//! This crate builds on `tradeloop-core` to provide:
//! - TOML run configuration with a deterministic run id
//! - CSV bar loading and cleaning
//! - Multi-symbol backtest runner over one shared account
//! - Performance report and artifact export (summary.json, trades.csv)
//! - Live session: one worker per symbol plus a reporter, over any venue
//! - Paper trading against the replay venue

pub mod config;
pub mod data_loader;
pub mod export;
pub mod live;
pub mod metrics;
pub mod runner;

pub use config::{ConfigError, LiveConfig, RunConfig, RunId, StrategyConfig, SymbolConfig};
pub use data_loader::{load_price_series, parse_price_series, LoadError, LoadStats, LoadedSeries};
pub use export::{export_json, export_trades_csv, import_json, load_artifacts, save_artifacts};
pub use live::{run_paper, LiveError, LiveSession, SessionSummary, TradeReporter};
pub use metrics::PerformanceReport;
pub use runner::{build_sources, run_backtest, run_backtest_from_data, BacktestResult, RunError};
