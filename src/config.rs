//! Configuration management
//!
//! Loads a JSON configuration file once at startup, with environment
//! variable overrides for API credentials (`BITSO_API_KEY` /
//! `BITSO_API_SECRET`). Constants are fixed for the process lifetime.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub exchange: ExchangeConfig,
    pub trading: TradingConfig,
    pub strategy: StrategyConfig,
    pub ledger: LedgerConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        // Load API credentials from environment if not set
        if let Ok(api_key) = std::env::var("BITSO_API_KEY") {
            config.exchange.api_key = Some(api_key);
        }
        if let Ok(api_secret) = std::env::var("BITSO_API_SECRET") {
            config.exchange.api_secret = Some(api_secret);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants the rest of the system relies on
    pub fn validate(&self) -> Result<()> {
        let s = &self.strategy;
        if s.rsi_period < 2 {
            anyhow::bail!("strategy.rsi_period must be at least 2, got {}", s.rsi_period);
        }
        if s.oversold >= s.overbought {
            anyhow::bail!(
                "strategy.oversold ({}) must be below strategy.overbought ({})",
                s.oversold,
                s.overbought
            );
        }
        if s.history_window <= s.rsi_period {
            anyhow::bail!(
                "strategy.history_window ({}) must exceed strategy.rsi_period ({})",
                s.history_window,
                s.rsi_period
            );
        }
        if self.trading.trade_size <= 0.0 {
            anyhow::bail!("trading.trade_size must be positive");
        }
        if self.trading.initial_quote_balance < 0.0 {
            anyhow::bail!("trading.initial_quote_balance must not be negative");
        }
        Ok(())
    }
}

/// Exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            api_key: None,
            api_secret: None,
        }
    }
}

/// Trading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Instrument pair, venue notation
    pub book: String,
    /// Starting quote-currency balance (base balance starts at zero)
    pub initial_quote_balance: f64,
    /// Base asset quantity per executed signal
    pub trade_size: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            book: "btc_usd".to_string(),
            initial_quote_balance: 30.63,
            trade_size: 0.01,
        }
    }
}

/// Strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    /// Number of recent prices fetched per tick; must exceed `rsi_period`
    pub history_window: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            rsi_period: 14,
            oversold: 35.0,
            overbought: 70.0,
            history_window: 50,
        }
    }
}

/// Trade ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub path: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            path: "bitso_trades_usd.csv".to_string(),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            poll_interval_secs: 30,
        }
    }
}
