use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================================================
// Engine
// ============================================================================

/// Cadence of the auction house's background clearing loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Time between the start of two consecutive clearing passes.
    pub tick_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
        }
    }
}

impl EngineConfig {
    /// Never shorter than 1 ms.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Sub-millisecond intervals round up to 1 ms.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX).max(1);
        self
    }
}

// ============================================================================
// Trader
// ============================================================================

/// Pricing and belief parameters shared by AI traders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderConfig {
    /// Number of own fill prices kept per commodity (observed trading range).
    pub internal_lookback: usize,
    /// Number of history points used for the market-wide average price.
    pub external_lookback: usize,
    /// Multiplier over the market average used as bid price.
    pub bid_markup: f64,
    /// Multiplier over cost basis used as ask price.
    pub ask_markup: f64,
    /// Floor for any quoted price.
    pub min_price: f64,
    /// Floor for the total cost attributed to one production run.
    pub min_production_cost: f64,
    /// Base seed for the trader's role RNG, mixed with the trader id.
    pub seed: u64,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            internal_lookback: 50,
            external_lookback: 15,
            bid_markup: 1.05,
            ask_markup: 1.02,
            min_price: 0.01,
            min_production_cost: 1.0,
            seed: 0,
        }
    }
}

impl TraderConfig {
    pub fn with_lookbacks(mut self, internal: usize, external: usize) -> Self {
        self.internal_lookback = internal;
        self.external_lookback = external;
        self
    }

    pub fn with_markups(mut self, bid: f64, ask: f64) -> Self {
        self.bid_markup = bid;
        self.ask_markup = ask;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

// ============================================================================
// Market
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub engine: EngineConfig,
    pub trader: TraderConfig,
}

impl MarketConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.tick_interval_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        let trader = &self.trader;
        if trader.internal_lookback == 0 {
            return Err(ConfigError::Invalid {
                field: "trader.internal_lookback",
                reason: "must be at least 1".to_string(),
            });
        }
        if trader.external_lookback == 0 {
            return Err(ConfigError::Invalid {
                field: "trader.external_lookback",
                reason: "must be at least 1".to_string(),
            });
        }
        for (field, value) in [
            ("trader.bid_markup", trader.bid_markup),
            ("trader.ask_markup", trader.ask_markup),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a positive number, got {value}"),
                });
            }
        }
        for (field, value) in [
            ("trader.min_price", trader.min_price),
            ("trader.min_production_cost", trader.min_production_cost),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be non-negative, got {value}"),
                });
            }
        }
        Ok(())
    }
}
