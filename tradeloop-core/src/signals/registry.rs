//! Strategy registry — explicit name → factory table.
//!
//! Populated from a fixed list at startup. Adding a strategy means adding a
//! line to [`StrategyRegistry::builtin`]; nothing is discovered at runtime.

use std::collections::BTreeMap;

use super::{Aggression, Breakout, Fakeout, MaCrossover, SignalSource, StrategyParams};

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
    #[error("Invalid parameter '{param}' for strategy '{strategy}': {reason}")]
    InvalidParam {
        strategy: String,
        param: String,
        reason: String,
    },
}

impl RegistryError {
    pub(crate) fn invalid(strategy: &str, param: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            strategy: strategy.to_string(),
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}

/// Builds a configured source from its parameters.
pub type SourceFactory =
    fn(&StrategyParams, Aggression) -> Result<Box<dyn SignalSource>, RegistryError>;

// ─── Registry ────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<&'static str, SourceFactory>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in strategy.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Breakout::NAME, |p, a| Ok(Box::new(Breakout::from_params(p, a)?)));
        registry.register(Fakeout::NAME, |p, a| Ok(Box::new(Fakeout::from_params(p, a)?)));
        registry.register(MaCrossover::NAME, |p, a| {
            Ok(Box::new(MaCrossover::from_params(p, a)?))
        });
        registry
    }

    /// Register (or replace) a factory under `name`.
    pub fn register(&mut self, name: &'static str, factory: SourceFactory) {
        self.factories.insert(name, factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Build one configured source.
    pub fn create(
        &self,
        name: &str,
        params: &StrategyParams,
        aggression: Aggression,
    ) -> Result<Box<dyn SignalSource>, RegistryError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RegistryError::UnknownStrategy(name.to_string()))?;
        factory(params, aggression)
    }
}
