//! Tradeloop CLI — backtest, paper-trading and report commands.
//!
//! Commands:
//! - `backtest` — replay CSV bars through the configured strategies and save artifacts
//! - `paper` — run the live session loop against a replay venue
//! - `report` — print the summary of a saved run directory

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tradeloop_runner::{
    load_artifacts, load_price_series, run_backtest, run_paper, save_artifacts, BacktestResult,
    RunConfig, SessionSummary,
};

/// Environment variable that overrides `--log-level` with a full filter directive.
const LOG_ENV: &str = "TRADELOOP_LOG";

#[derive(Parser)]
#[command(
    name = "tradeloop",
    about = "Tradeloop CLI — breakout/trend signal backtesting and paper trading"
)]
struct Cli {
    /// Default log level when TRADELOOP_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest from a TOML config file.
    Backtest {
        /// Path to the run config.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for artifacts. Defaults to the config's `output_dir`.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the summary without writing artifacts.
        #[arg(long, default_value_t = false)]
        no_export: bool,
    },
    /// Paper-trade the config's symbols against their bar files.
    Paper {
        /// Path to the run config.
        #[arg(long)]
        config: PathBuf,

        /// Wall-clock time per replayed bar, in milliseconds.
        #[arg(long, default_value_t = 100)]
        step_ms: u64,
    },
    /// Print the summary of a saved run.
    Report {
        /// Run directory containing summary.json.
        run_dir: PathBuf,

        /// Print the raw summary as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Backtest {
            config,
            output_dir,
            no_export,
        } => run_backtest_cmd(config, output_dir, no_export),
        Commands::Paper { config, step_ms } => run_paper_cmd(config, step_ms),
        Commands::Report { run_dir, json } => run_report_cmd(run_dir, json),
    }
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level: {level}"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn run_backtest_cmd(
    config_path: PathBuf,
    output_dir: Option<PathBuf>,
    no_export: bool,
) -> Result<()> {
    let config = RunConfig::from_file(&config_path)?;
    let result = run_backtest(&config)
        .with_context(|| format!("backtest failed for {}", config_path.display()))?;

    print_summary(&result);

    if !no_export {
        let dir = output_dir.unwrap_or_else(|| config.output_dir.clone());
        let run_dir = save_artifacts(&result, &dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_paper_cmd(config_path: PathBuf, step_ms: u64) -> Result<()> {
    if step_ms == 0 {
        bail!("--step-ms must be at least 1");
    }
    let config = RunConfig::from_file(&config_path)?;

    let mut series = Vec::with_capacity(config.symbols.len());
    for symbol in &config.symbols {
        let Some(path) = symbol.data.as_deref() else {
            bail!("symbol {} has no data file to replay", symbol.symbol);
        };
        series.push(load_price_series(path, &symbol.symbol)?.series);
    }

    let summary = run_paper(&config, series, Duration::from_millis(step_ms))
        .context("paper session failed")?;
    print_session(&summary);
    Ok(())
}

fn run_report_cmd(run_dir: PathBuf, json: bool) -> Result<()> {
    let result = load_artifacts(&run_dir)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Run:            {}", result.run_id);
    println!("Symbols:        {}", result.symbols.join(", "));
    println!("Strategies:     {}", result.strategies.join(", "));
    println!("Bars:           {}", result.bar_count);
    println!("Balance:        {:.2} -> {:.2}", result.initial_balance, result.final_balance);
    println!("{}", result.report);
    for position in &result.open_positions {
        println!(
            "OPEN: {} {} {} @ {:.5} (SL {:.5} / TP {:.5})",
            position.symbol,
            position.direction,
            position.volume,
            position.entry_price,
            position.stop_loss,
            position.take_profit
        );
    }
    if result.ruined {
        println!("WARNING: account balance reached zero, trading halted");
    }
    println!();
}

fn print_session(summary: &SessionSummary) {
    println!();
    println!("=== Paper Session ===");
    println!("Balance:        {:.2}", summary.account.balance());
    println!("{}", summary.report);
    if summary.account.is_ruined() {
        println!("WARNING: account balance reached zero, trading halted");
    }
    println!();
}
