//! Core data types used across the trading agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a trade would overdraw a balance
#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("insufficient quote balance: need {required:.2}, have {available:.2}")]
    InsufficientQuote { required: f64, available: f64 },

    #[error("insufficient base balance: need {required:.6}, have {available:.6}")]
    InsufficientBase { required: f64, available: f64 },
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// An executed trade with the balances that resulted from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    /// Base asset quantity traded
    pub amount: f64,
    /// Execution price in quote currency per unit of base
    pub price: f64,
    /// `amount * price`, quote currency
    pub total: f64,
    pub quote_balance_after: f64,
    pub base_balance_after: f64,
}

/// The two balances the agent trades against
///
/// Mutated only through [`Portfolio::debit_quote`] and
/// [`Portfolio::debit_base`], which refuse to go negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub quote: f64,
    pub base: f64,
}

impl Portfolio {
    pub fn new(quote: f64, base: f64) -> Self {
        Portfolio { quote, base }
    }

    /// Spend `cost` quote currency in exchange for `amount` base asset
    pub fn debit_quote(&mut self, cost: f64, amount: f64) -> Result<(), BalanceError> {
        if self.quote < cost {
            return Err(BalanceError::InsufficientQuote {
                required: cost,
                available: self.quote,
            });
        }
        self.quote -= cost;
        self.base += amount;
        Ok(())
    }

    /// Sell `amount` base asset in exchange for `proceeds` quote currency
    pub fn debit_base(&mut self, amount: f64, proceeds: f64) -> Result<(), BalanceError> {
        if self.base < amount {
            return Err(BalanceError::InsufficientBase {
                required: amount,
                available: self.base,
            });
        }
        self.base -= amount;
        self.quote += proceeds;
        Ok(())
    }
}
