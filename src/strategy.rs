//! RSI threshold decision engine
//!
//! One transition is evaluated per tick: buy below the oversold threshold,
//! sell above the overbought threshold, hold otherwise. Trades move a fixed
//! base-asset quantity and are rejected outright when the portfolio cannot
//! cover them.

use chrono::{DateTime, Utc};

use crate::types::{BalanceError, Portfolio, Side, TradeRecord};

/// Trade intent for a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

/// Fixed-size RSI threshold strategy
#[derive(Debug, Clone)]
pub struct RsiStrategy {
    oversold: f64,
    overbought: f64,
    trade_size: f64,
}

impl RsiStrategy {
    /// `oversold < overbought` is a precondition; [`crate::config::Config`]
    /// validation enforces it before a strategy is built.
    pub fn new(oversold: f64, overbought: f64, trade_size: f64) -> Self {
        debug_assert!(oversold < overbought);
        debug_assert!(trade_size > 0.0);
        Self {
            oversold,
            overbought,
            trade_size,
        }
    }

    pub fn trade_size(&self) -> f64 {
        self.trade_size
    }

    /// Map an RSI reading to a trade intent
    ///
    /// Thresholds are exclusive: a reading exactly on either threshold holds.
    pub fn decide(&self, rsi: f64) -> Action {
        if rsi < self.oversold {
            Action::Buy
        } else if rsi > self.overbought {
            Action::Sell
        } else {
            Action::Hold
        }
    }

    /// Apply a trade intent to the portfolio
    ///
    /// On a buy or sell this mutates the balances and returns the executed
    /// trade with post-mutation balances. Insufficient balance returns an
    /// error and leaves the portfolio untouched; a hold returns `None`.
    pub fn apply(
        &self,
        portfolio: &mut Portfolio,
        action: Action,
        price: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<TradeRecord>, BalanceError> {
        let amount = self.trade_size;
        let total = amount * price;

        let side = match action {
            Action::Hold => return Ok(None),
            Action::Buy => {
                portfolio.debit_quote(total, amount)?;
                Side::Buy
            }
            Action::Sell => {
                portfolio.debit_base(amount, total)?;
                Side::Sell
            }
        };

        Ok(Some(TradeRecord {
            timestamp: now,
            side,
            amount,
            price,
            total,
            quote_balance_after: portfolio.quote,
            base_balance_after: portfolio.base,
        }))
    }
}
