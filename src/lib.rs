//! RSI trading agent for Bitso
//!
//! Polls the BTC/USD spot price, computes a Wilder-smoothed RSI over a
//! recent price window, and issues fixed-size buy/sell decisions against a
//! two-balance portfolio. Every executed trade is appended to a durable
//! CSV ledger.

pub mod auth;
pub mod config;
pub mod indicators;
pub mod ledger;
pub mod market;
pub mod strategy;
pub mod trader;
pub mod types;

pub use config::Config;
pub use types::*;
