//! Single-pass command: one fetch/decide/persist cycle, then exit
//!
//! Useful as an operator smoke check before leaving the loop running.

use anyhow::{Context, Result};
use tracing::info;

use rsi_trader::config::Config;
use rsi_trader::market::{BitsoClient, SyntheticFeed};

use super::run::build_trader;

pub fn run(config_path: String, synthetic: bool) -> Result<()> {
    let config = Config::from_file(&config_path).context("Failed to load configuration")?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let outcome = if synthetic {
            let mut trader = build_trader(&config, SyntheticFeed::default())?;
            trader.tick().await?
        } else {
            let client = BitsoClient::new(config.trading.book.clone(), None)?;
            let mut trader = build_trader(&config, client)?;
            trader.tick().await?
        };

        match outcome.trade {
            Some(trade) => info!(
                "Tick result: price {:.2}, RSI {:.2}, executed {} of {:.6}",
                outcome.price, outcome.rsi, trade.side, trade.amount
            ),
            None => info!(
                "Tick result: price {:.2}, RSI {:.2}, no trade",
                outcome.price, outcome.rsi
            ),
        }
        Ok(())
    })
}
