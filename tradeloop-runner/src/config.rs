//! Serializable run configuration.
//!
//! One TOML file describes a whole run: the account, the instruments with
//! their data files and quoting rules, the strategies in priority order and
//! the live-loop timing. Offline backtests and live sessions read the same
//! file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradeloop_core::domain::InstrumentProfile;
use tradeloop_core::engine::SymbolSetup;
use tradeloop_core::signals::{Aggression, StrategyParams, StrategyRegistry};

/// Unique identifier for a run (content-addressable hash of its config).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Top-level run configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub initial_balance: f64,

    #[serde(default)]
    pub aggression: Aggression,

    /// Force-close positions still open at end of data. When false they are
    /// reported as open instead.
    #[serde(default = "default_true")]
    pub mark_to_market_close: bool,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    pub symbols: Vec<SymbolConfig>,

    /// Queried in this order; the first intent wins.
    pub strategies: Vec<StrategyConfig>,

    #[serde(default)]
    pub live: LiveConfig,
}

/// One tradable instrument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SymbolConfig {
    pub symbol: String,

    /// Bar file for offline runs. Relative paths resolve against the config file.
    #[serde(default)]
    pub data: Option<PathBuf>,

    pub digits: u32,
    pub tick_size: f64,

    #[serde(default)]
    pub min_stop_ticks: u32,

    #[serde(default = "default_contract_size")]
    pub contract_size: f64,

    pub volume: f64,

    /// Quoted spread in price units, used by the replay venue.
    #[serde(default)]
    pub spread: f64,
}

impl SymbolConfig {
    pub fn profile(&self) -> InstrumentProfile {
        InstrumentProfile::new(
            self.symbol.clone(),
            self.digits,
            self.tick_size,
            self.min_stop_ticks,
            self.contract_size,
        )
    }

    pub fn setup(&self) -> SymbolSetup {
        SymbolSetup {
            profile: self.profile(),
            volume: self.volume,
        }
    }
}

/// A strategy by registry name, with its numeric parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub name: String,

    #[serde(default)]
    pub params: StrategyParams,
}

/// Live-loop timing and filters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct LiveConfig {
    /// Sleep between worker cycles.
    pub poll_interval_ms: u64,

    /// A cycle is skipped when `ask - bid` exceeds this many ticks.
    pub max_spread_ticks: f64,

    /// Period of the reporting worker.
    pub report_interval_secs: u64,

    /// Bars requested from the venue per cycle.
    pub history_bars: usize,

    /// Cycles with fewer bars than this are skipped.
    pub min_bars: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 60_000,
            max_spread_ticks: 50.0,
            report_interval_secs: 3_600,
            history_bars: 200,
            min_bars: 50,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("runs")
}

fn default_contract_size() -> f64 {
    1.0
}

impl RunConfig {
    /// Parse and validate a config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file. Relative data paths are resolved against the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for symbol in &mut self.symbols {
            if let Some(data) = &symbol.data {
                if data.is_relative() {
                    symbol.data = Some(base.join(data));
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(invalid(format!(
                "initial_balance must be positive, got {}",
                self.initial_balance
            )));
        }
        if self.symbols.is_empty() {
            return Err(invalid("at least one [[symbols]] entry is required"));
        }

        let mut seen = BTreeSet::new();
        for s in &self.symbols {
            if s.symbol.trim().is_empty() {
                return Err(invalid("symbol name must not be empty"));
            }
            if !seen.insert(s.symbol.as_str()) {
                return Err(invalid(format!("symbol '{}' is listed twice", s.symbol)));
            }
            if !(s.tick_size.is_finite() && s.tick_size > 0.0) {
                return Err(invalid(format!(
                    "{}: tick_size must be positive, got {}",
                    s.symbol, s.tick_size
                )));
            }
            if !(s.contract_size.is_finite() && s.contract_size > 0.0) {
                return Err(invalid(format!(
                    "{}: contract_size must be positive, got {}",
                    s.symbol, s.contract_size
                )));
            }
            if !(s.volume.is_finite() && s.volume > 0.0) {
                return Err(invalid(format!(
                    "{}: volume must be positive, got {}",
                    s.symbol, s.volume
                )));
            }
            if !(s.spread.is_finite() && s.spread >= 0.0) {
                return Err(invalid(format!(
                    "{}: spread must be non-negative, got {}",
                    s.symbol, s.spread
                )));
            }
        }

        if self.strategies.is_empty() {
            return Err(invalid("at least one [[strategies]] entry is required"));
        }
        let registry = StrategyRegistry::builtin();
        for strategy in &self.strategies {
            if !registry.contains(&strategy.name) {
                return Err(invalid(format!(
                    "unknown strategy '{}' (available: {})",
                    strategy.name,
                    registry.names().join(", ")
                )));
            }
            registry
                .create(&strategy.name, &strategy.params, self.aggression)
                .map_err(|e| invalid(e.to_string()))?;
        }

        let live = &self.live;
        if live.poll_interval_ms == 0 {
            return Err(invalid("live.poll_interval_ms must be at least 1"));
        }
        if !(live.max_spread_ticks.is_finite() && live.max_spread_ticks >= 0.0) {
            return Err(invalid("live.max_spread_ticks must be non-negative"));
        }
        if live.min_bars == 0 || live.history_bars < live.min_bars {
            return Err(invalid(format!(
                "live.history_bars ({}) must be >= live.min_bars ({}) >= 1",
                live.history_bars, live.min_bars
            )));
        }
        Ok(())
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        let hash = blake3::hash(json.as_bytes());
        Ok(format!("{}", hash.to_hex()))
    }

    pub fn symbol(&self, name: &str) -> Option<&SymbolConfig> {
        self.symbols.iter().find(|s| s.symbol == name)
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
