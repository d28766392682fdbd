//! Tick orchestration and the polling loop
//!
//! One tick runs the full pipeline: fetch history, compute RSI, fetch the
//! spot price, evaluate the threshold rule, mutate the portfolio, persist
//! the trade. Ticks never overlap; the loop idles for the configured
//! interval between them and stops cleanly when the shutdown channel fires.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::indicators::{self, IndicatorError};
use crate::ledger::TradeLedger;
use crate::market::{MarketData, MarketError};
use crate::strategy::RsiStrategy;
use crate::types::{Portfolio, TradeRecord};

/// Errors that abort a tick before any state changes
///
/// Both variants degrade to "skip this tick"; the next one proceeds
/// normally after the interval elapses.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),
}

/// Hook invoked after a tick executes a trade
///
/// The live command uses this to submit the trade to the venue; paper and
/// synthetic runs use [`PaperHook`].
#[async_trait]
pub trait TradeHook: Send + Sync {
    async fn on_trade(&self, trade: &TradeRecord);
}

/// Executed trades stay local
pub struct PaperHook;

#[async_trait]
impl TradeHook for PaperHook {
    async fn on_trade(&self, _trade: &TradeRecord) {}
}

/// What a completed tick observed and did
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub price: f64,
    pub rsi: f64,
    pub trade: Option<TradeRecord>,
}

/// The decision loop: market feed, strategy, portfolio, and ledger
pub struct Trader<M: MarketData> {
    market: M,
    strategy: RsiStrategy,
    rsi_period: usize,
    history_window: usize,
    portfolio: Portfolio,
    ledger: TradeLedger,
}

impl<M: MarketData> Trader<M> {
    pub fn new(
        market: M,
        strategy: RsiStrategy,
        rsi_period: usize,
        history_window: usize,
        portfolio: Portfolio,
        ledger: TradeLedger,
    ) -> Self {
        Self {
            market,
            strategy,
            rsi_period,
            history_window,
            portfolio,
            ledger,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Run one decision pass
    ///
    /// A market or indicator failure aborts before any mutation. A trade
    /// blocked by balance is logged and becomes a hold. A ledger write
    /// failure is reported loudly but the in-memory balances stand.
    pub async fn tick(&mut self) -> Result<TickOutcome, TickError> {
        let prices = self.market.recent_prices(self.history_window).await?;
        let rsi = indicators::latest_rsi(&prices, self.rsi_period)?;
        let price = self.market.current_price().await?;

        info!("Current price: {:.2}, RSI: {:.2}", price, rsi);

        let action = self.strategy.decide(rsi);
        let trade = match self.strategy.apply(&mut self.portfolio, action, price, Utc::now()) {
            Ok(trade) => trade,
            Err(e) => {
                warn!("Trade skipped: {}", e);
                None
            }
        };

        if let Some(ref record) = trade {
            info!(
                "Executed {}: {:.6} at {:.2} (quote: {:.2}, base: {:.6})",
                record.side,
                record.amount,
                record.price,
                record.quote_balance_after,
                record.base_balance_after
            );
            if let Err(e) = self.ledger.append(record) {
                // Balances already moved; run on in degraded mode rather
                // than crash, but make the gap in the ledger visible.
                warn!("Trade executed but NOT persisted to ledger: {:#}", e);
            }
        }

        Ok(TickOutcome { price, rsi, trade })
    }

    /// Poll until the shutdown channel reports `true`
    ///
    /// The shutdown check happens between ticks, never mid-request.
    pub async fn run(
        &mut self,
        interval: std::time::Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        self.run_with(interval, shutdown, &PaperHook).await
    }

    /// Poll as [`Trader::run`] does, invoking `hook` for every executed trade
    pub async fn run_with<H: TradeHook>(
        &mut self,
        interval: std::time::Duration,
        mut shutdown: watch::Receiver<bool>,
        hook: &H,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("Polling every {}s", interval.as_secs());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(outcome) => {
                            if let Some(trade) = outcome.trade {
                                hook.on_trade(&trade).await;
                            }
                        }
                        Err(e) => warn!("Tick skipped: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown; without the
                    // check this branch would resolve with Err on every
                    // iteration and spin the loop
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown requested, stopping after current tick");
                        break;
                    }
                }
            }
        }

        info!(
            "Final balances: quote {:.2}, base {:.6}",
            self.portfolio.quote, self.portfolio.base
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{MarketData, MarketError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Scripted feed: fixed history and spot price, optionally failing
    struct ScriptedFeed {
        history: Vec<f64>,
        spot: f64,
        fail: AtomicBool,
    }

    impl ScriptedFeed {
        fn new(history: Vec<f64>, spot: f64) -> Self {
            Self {
                history,
                spot,
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl MarketData for ScriptedFeed {
        async fn current_price(&self) -> Result<f64, MarketError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MarketError::Status {
                    status: 503,
                    body: "down".to_string(),
                });
            }
            Ok(self.spot)
        }

        async fn recent_prices(&self, window: usize) -> Result<Vec<f64>, MarketError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MarketError::Status {
                    status: 503,
                    body: "down".to_string(),
                });
            }
            Ok(self.history.iter().rev().take(window).rev().copied().collect())
        }
    }

    fn falling_history() -> Vec<f64> {
        (0..50).map(|i| 30_000.0 - i as f64 * 100.0).collect()
    }

    fn rising_history() -> Vec<f64> {
        (0..50).map(|i| 25_000.0 + i as f64 * 100.0).collect()
    }

    fn choppy_history() -> Vec<f64> {
        (0..50)
            .map(|i| 27_000.0 + if i % 2 == 0 { 150.0 } else { -150.0 })
            .collect()
    }

    fn trader_with(
        feed: ScriptedFeed,
        quote: f64,
        base: f64,
        dir: &tempfile::TempDir,
    ) -> Trader<ScriptedFeed> {
        Trader::new(
            feed,
            RsiStrategy::new(35.0, 70.0, 0.01),
            14,
            50,
            Portfolio::new(quote, base),
            TradeLedger::new(dir.path().join("trades.csv")),
        )
    }

    #[tokio::test]
    async fn test_oversold_tick_buys_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut trader = trader_with(ScriptedFeed::new(falling_history(), 25_000.0), 500.0, 0.0, &dir);

        let outcome = trader.tick().await.unwrap();

        assert!(outcome.rsi < 35.0);
        let trade = outcome.trade.expect("oversold tick should buy");
        assert_eq!(trade.side, crate::types::Side::Buy);
        assert_eq!(trader.portfolio().quote, 250.0);
        assert_eq!(trader.portfolio().base, 0.01);

        let ledger = TradeLedger::new(dir.path().join("trades.csv"));
        assert_eq!(ledger.read_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_overbought_tick_sells() {
        let dir = tempfile::tempdir().unwrap();
        let mut trader = trader_with(ScriptedFeed::new(rising_history(), 30_000.0), 0.0, 0.02, &dir);

        let outcome = trader.tick().await.unwrap();

        assert!(outcome.rsi > 70.0);
        let trade = outcome.trade.expect("overbought tick should sell");
        assert_eq!(trade.side, crate::types::Side::Sell);
        assert_eq!(trader.portfolio().quote, 300.0);
        assert!((trader.portfolio().base - 0.01).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_neutral_tick_holds() {
        let dir = tempfile::tempdir().unwrap();
        let mut trader = trader_with(ScriptedFeed::new(choppy_history(), 27_000.0), 500.0, 0.0, &dir);

        let outcome = trader.tick().await.unwrap();

        assert!(outcome.trade.is_none());
        assert_eq!(trader.portfolio().quote, 500.0);
        assert!(!dir.path().join("trades.csv").exists());
    }

    #[tokio::test]
    async fn test_network_failure_leaves_everything_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let feed = ScriptedFeed::new(falling_history(), 25_000.0);
        feed.fail.store(true, Ordering::SeqCst);
        let mut trader = trader_with(feed, 500.0, 0.005, &dir);

        let err = trader.tick().await.unwrap_err();

        assert!(matches!(err, TickError::Market(_)));
        assert_eq!(trader.portfolio().quote, 500.0);
        assert_eq!(trader.portfolio().base, 0.005);
        assert!(!dir.path().join("trades.csv").exists());
    }

    #[tokio::test]
    async fn test_underfunded_buy_becomes_hold() {
        let dir = tempfile::tempdir().unwrap();
        // Oversold signal but 0.01 * 25000 = 250 > 100 available
        let mut trader = trader_with(ScriptedFeed::new(falling_history(), 25_000.0), 100.0, 0.0, &dir);

        let outcome = trader.tick().await.unwrap();

        assert!(outcome.trade.is_none());
        assert_eq!(trader.portfolio().quote, 100.0);
        assert!(!dir.path().join("trades.csv").exists());
    }

    #[tokio::test]
    async fn test_short_history_aborts_tick() {
        let dir = tempfile::tempdir().unwrap();
        // Feed can only produce 10 prices against a 14-period RSI
        let feed = ScriptedFeed::new(vec![25_000.0; 10], 25_000.0);
        let mut trader = trader_with(feed, 500.0, 0.0, &dir);

        let err = trader.tick().await.unwrap_err();
        assert!(matches!(err, TickError::Indicator(_)));
    }

    #[tokio::test]
    async fn test_ledger_failure_keeps_trade_and_balances() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory does not exist, so every append fails
        let ledger_path = dir.path().join("missing").join("trades.csv");
        let mut trader = Trader::new(
            ScriptedFeed::new(falling_history(), 25_000.0),
            RsiStrategy::new(35.0, 70.0, 0.01),
            14,
            50,
            Portfolio::new(500.0, 0.0),
            TradeLedger::new(&ledger_path),
        );

        let outcome = trader.tick().await.unwrap();

        // Degraded mode: the trade executed and the balances moved even
        // though nothing reached disk
        let trade = outcome.trade.expect("trade executes despite ledger failure");
        assert_eq!(trade.side, crate::types::Side::Buy);
        assert_eq!(trader.portfolio().quote, 250.0);
        assert_eq!(trader.portfolio().base, 0.01);
        assert!(!ledger_path.exists());
    }

    struct CountingHook(std::sync::Mutex<usize>);

    #[async_trait]
    impl TradeHook for CountingHook {
        async fn on_trade(&self, _trade: &TradeRecord) {
            *self.0.lock().unwrap() += 1;
        }
    }

    #[tokio::test]
    async fn test_run_with_invokes_hook_once_per_executed_trade() {
        let dir = tempfile::tempdir().unwrap();
        // Quote covers exactly one buy; later oversold ticks hold
        let mut trader = trader_with(ScriptedFeed::new(falling_history(), 25_000.0), 250.0, 0.0, &dir);

        let (tx, rx) = watch::channel(false);
        let hook = CountingHook(std::sync::Mutex::new(0));

        let stop = async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            tx.send(true).unwrap();
        };
        let (result, _) = tokio::join!(
            trader.run_with(std::time::Duration::from_millis(10), rx, &hook),
            stop
        );
        result.unwrap();

        assert_eq!(*hook.0.lock().unwrap(), 1);
        assert_eq!(trader.portfolio().quote, 0.0);
    }

    #[tokio::test]
    async fn test_run_stops_when_shutdown_sender_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut trader = trader_with(ScriptedFeed::new(choppy_history(), 27_000.0), 500.0, 0.0, &dir);

        let (tx, rx) = watch::channel(false);
        drop(tx);

        // A closed channel must read as shutdown, not spin the loop
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            trader.run(std::time::Duration::from_millis(10), rx),
        )
        .await
        .expect("run did not stop after sender was dropped")
        .unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let dir = tempfile::tempdir().unwrap();
        let mut trader = trader_with(ScriptedFeed::new(choppy_history(), 27_000.0), 500.0, 0.0, &dir);

        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        // First interval tick fires immediately, then the shutdown branch
        // is taken; a wedged loop would trip the timeout instead.
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            trader.run(std::time::Duration::from_millis(10), rx),
        )
        .await
        .expect("run did not stop on shutdown")
        .unwrap();
    }
}
