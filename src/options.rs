use std::fmt;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

use crate::error::{BurningError, Result};
use crate::metrics::{default_metrics, RoutingMetrics};

/// Hop budget used when none is configured.
pub const DEFAULT_HOP_BUDGET: u32 = 64;

/// Largest accepted hop budget.
pub const MAX_HOP_BUDGET: u32 = 4096;

/// Configuration shared by network searches and insertion plans.
#[derive(Clone)]
pub struct RoutingOptions {
    /// Maximum number of relay hops walked away from the start.
    pub hop_budget: u32,
    /// Seed for direction shuffling; `None` draws from entropy on every call.
    pub shuffle_seed: Option<u64>,
    /// Optional metrics collection implementation.
    pub metrics: Option<Arc<dyn RoutingMetrics>>,
}

impl RoutingOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self {
            hop_budget: DEFAULT_HOP_BUDGET,
            shuffle_seed: None,
            metrics: None,
        }
    }

    /// Sets the hop budget, capped at [`MAX_HOP_BUDGET`].
    pub fn hop_budget(mut self, hops: u32) -> Self {
        self.hop_budget = hops.min(MAX_HOP_BUDGET);
        self
    }

    /// Makes direction shuffling reproducible.
    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn RoutingMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Loads `hop_budget` and `shuffle_seed` from a TOML document.
    ///
    /// Missing keys keep their defaults; a budget above [`MAX_HOP_BUDGET`] is
    /// rejected.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let raw: RawOptions = toml::from_str(source)?;
        let mut options = Self::new();
        if let Some(hops) = raw.hop_budget {
            if hops > MAX_HOP_BUDGET {
                return Err(BurningError::Invalid("hop_budget exceeds the maximum of 4096"));
            }
            options.hop_budget = hops;
        }
        options.shuffle_seed = raw.shuffle_seed;
        Ok(options)
    }

    pub(crate) fn metrics_handle(&self) -> Arc<dyn RoutingMetrics> {
        self.metrics.clone().unwrap_or_else(default_metrics)
    }

    pub(crate) fn rng(&self) -> ChaCha8Rng {
        match self.shuffle_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RoutingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingOptions")
            .field("hop_budget", &self.hop_budget)
            .field("shuffle_seed", &self.shuffle_seed)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOptions {
    hop_budget: Option<u32>,
    shuffle_seed: Option<u64>,
}
