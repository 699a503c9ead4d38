//! Reporting and export — JSON summary and CSV trade tape.
//!
//! A run's artifacts are:
//! - `summary.json`: the full `BacktestResult` with schema versioning
//! - `trades.csv`: one row per closed trade
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tradeloop_core::domain::ClosedTrade;

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Export closed trades as CSV in close order.
///
/// Columns: ticket, symbol, strategy, direction, volume, entry_time,
/// entry_price, stop_loss, take_profit, exit_time, exit_price, reason, profit
pub fn export_trades_csv(trades: &[ClosedTrade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "ticket",
        "symbol",
        "strategy",
        "direction",
        "volume",
        "entry_time",
        "entry_price",
        "stop_loss",
        "take_profit",
        "exit_time",
        "exit_price",
        "reason",
        "profit",
    ])?;

    for t in trades {
        wtr.write_record([
            t.ticket.0.to_string().as_str(),
            t.symbol.as_str(),
            t.strategy.as_str(),
            t.direction.as_str(),
            t.volume.to_string().as_str(),
            t.entry_time.format(TIME_FORMAT).to_string().as_str(),
            t.entry_price.to_string().as_str(),
            t.stop_loss.to_string().as_str(),
            t.take_profit.to_string().as_str(),
            t.exit_time.format(TIME_FORMAT).to_string().as_str(),
            t.exit_price.to_string().as_str(),
            t.reason.as_str(),
            t.profit.to_string().as_str(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for a run.
///
/// Creates `{run_id prefix}_{timestamp}/` under `output_dir` containing
/// `summary.json` and `trades.csv`. Returns the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = result.run_id.chars().take(12).collect();
    let dirname = format!("{}_{}", prefix, chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let json = export_json(result)?;
    std::fs::write(run_dir.join("summary.json"), &json)
        .with_context(|| format!("failed to write summary.json in {}", run_dir.display()))?;

    let trades_csv = export_trades_csv(&result.trades)?;
    std::fs::write(run_dir.join("trades.csv"), &trades_csv)
        .with_context(|| format!("failed to write trades.csv in {}", run_dir.display()))?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's summary.json.
pub fn load_artifacts(run_dir: &Path) -> Result<BacktestResult> {
    let path = run_dir.join("summary.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
