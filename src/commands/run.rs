//! Polling loop command
//!
//! Paper mode (the default) only mutates the in-memory portfolio and the
//! CSV ledger. With `--live`, every executed trade is also submitted to the
//! venue as a signed market order.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use rsi_trader::auth::Credentials;
use rsi_trader::config::Config;
use rsi_trader::ledger::TradeLedger;
use rsi_trader::market::{BitsoClient, MarketData, SyntheticFeed};
use rsi_trader::strategy::RsiStrategy;
use rsi_trader::trader::{TradeHook, Trader};
use rsi_trader::types::{Portfolio, TradeRecord};

pub fn run(
    config_path: String,
    interval_override: Option<u64>,
    synthetic: bool,
    live: bool,
) -> Result<()> {
    let config = Config::from_file(&config_path).context("Failed to load configuration")?;

    if live && synthetic {
        anyhow::bail!("--live and --synthetic are mutually exclusive");
    }

    if live {
        warn!("⚠️  LIVE TRADING MODE - REAL MONEY AT RISK!");
        warn!("Press Ctrl+C within 5 seconds to abort...");
        std::thread::sleep(Duration::from_secs(5));
    }

    let interval = Duration::from_secs(
        interval_override.unwrap_or(config.scheduler.poll_interval_secs),
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_async(config, interval, synthetic, live))
}

/// Assemble the decision loop from configuration and a market feed
pub fn build_trader<M: MarketData>(config: &Config, market: M) -> Result<Trader<M>> {
    let strategy = RsiStrategy::new(
        config.strategy.oversold,
        config.strategy.overbought,
        config.trading.trade_size,
    );
    let portfolio = Portfolio::new(config.trading.initial_quote_balance, 0.0);
    let ledger = TradeLedger::new(&config.ledger.path);

    Ok(Trader::new(
        market,
        strategy,
        config.strategy.rsi_period,
        config.strategy.history_window,
        portfolio,
        ledger,
    ))
}

/// Submits every executed trade to the venue as a signed market order
struct OrderSubmitter {
    client: BitsoClient,
}

#[async_trait]
impl TradeHook for OrderSubmitter {
    async fn on_trade(&self, trade: &TradeRecord) {
        match self.client.place_order(trade.side, trade.amount).await {
            Ok(oid) => info!("Order accepted by venue: {}", oid),
            Err(e) => error!("Order submission failed: {}", e),
        }
    }
}

fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn run_async(config: Config, interval: Duration, synthetic: bool, live: bool) -> Result<()> {
    info!("🚀 Starting RSI trading agent");
    info!("Book: {}", config.trading.book);
    info!(
        "Strategy: RSI({}) oversold < {} / overbought > {}, trade size {}",
        config.strategy.rsi_period,
        config.strategy.oversold,
        config.strategy.overbought,
        config.trading.trade_size
    );
    info!("Ledger: {}", config.ledger.path);

    let shutdown = shutdown_channel();

    if synthetic {
        info!("Mode: SYNTHETIC feed (offline dry run)");
        let mut trader = build_trader(&config, SyntheticFeed::default())?;
        return trader.run(interval, shutdown).await;
    }

    let credentials = match (&config.exchange.api_key, &config.exchange.api_secret) {
        (Some(key), Some(secret)) => Some(
            Credentials::new(key.clone(), secret.clone())
                .context("Invalid API credentials")?,
        ),
        _ if live => anyhow::bail!(
            "Live mode requires BITSO_API_KEY and BITSO_API_SECRET (env or config)"
        ),
        _ => None,
    };

    let client = BitsoClient::new(config.trading.book.clone(), credentials)?;
    let mut trader = build_trader(&config, client.clone())?;

    if !live {
        info!("Mode: PAPER trading against live prices");
        return trader.run(interval, shutdown).await;
    }

    info!("Mode: LIVE trading");
    let submitter = OrderSubmitter { client };
    trader.run_with(interval, shutdown, &submitter).await
}
