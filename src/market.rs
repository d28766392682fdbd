//! Market data access
//!
//! The decision engine depends only on the [`MarketData`] trait. Two
//! implementations are provided: [`BitsoClient`] talks to the real venue,
//! [`SyntheticFeed`] generates prices for tests and offline dry runs.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::auth::Credentials;
use crate::types::Side;

const BITSO_API_BASE: &str = "https://api.bitso.com";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API rejected request: {0}")]
    Api(String),

    #[error("failed to parse price field: {0}")]
    Parse(String),

    #[error("venue returned {got} prices, need {want}")]
    ShortHistory { want: usize, got: usize },

    #[error("operation requires API credentials")]
    MissingCredentials,
}

/// Capability trait for price acquisition
///
/// `recent_prices` returns exactly `window` prices, oldest first, ready to
/// feed straight into the RSI calculation.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn current_price(&self) -> Result<f64, MarketError>;
    async fn recent_prices(&self, window: usize) -> Result<Vec<f64>, MarketError>;
}

// =============================================================================
// Bitso client
// =============================================================================

#[derive(Debug, Deserialize)]
struct TickerResponse {
    success: bool,
    payload: TickerPayload,
}

#[derive(Debug, Deserialize)]
struct TickerPayload {
    last: String,
}

#[derive(Debug, Deserialize)]
struct TradesResponse {
    success: bool,
    payload: Vec<PublicTrade>,
}

#[derive(Debug, Deserialize)]
struct PublicTrade {
    price: String,
}

#[derive(Debug, Serialize)]
struct OrderRequest {
    book: String,
    side: Side,
    #[serde(rename = "type")]
    order_type: String,
    major: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    success: bool,
    payload: OrderPayload,
}

#[derive(Debug, Deserialize)]
struct OrderPayload {
    oid: String,
}

/// HTTP client for the Bitso REST API
///
/// Public reads (ticker, trades) are unauthenticated; order placement is
/// signed with [`Credentials`] and only available when they are configured.
/// Cloneable so the polling loop and the order-submission hook can share
/// one connection pool and one nonce sequence.
#[derive(Clone)]
pub struct BitsoClient {
    client: reqwest::Client,
    base_url: String,
    book: String,
    credentials: Option<Arc<Credentials>>,
}

impl BitsoClient {
    pub fn new(book: impl Into<String>, credentials: Option<Credentials>) -> Result<Self, MarketError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: BITSO_API_BASE.to_string(),
            book: book.into(),
            credentials: credentials.map(Arc::new),
        })
    }

    /// Point the client at a different host (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json(&self, path: &str) -> Result<reqwest::Response, MarketError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Place a market order for `amount` units of the base asset
    ///
    /// Returns the venue's order id.
    pub async fn place_order(&self, side: Side, amount: f64) -> Result<String, MarketError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(MarketError::MissingCredentials)?;

        let path = "/v3/orders/";
        let request = OrderRequest {
            book: self.book.clone(),
            side,
            order_type: "market".to_string(),
            major: format!("{:.8}", amount),
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| MarketError::Parse(e.to_string()))?;

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("Authorization", credentials.sign("POST", path, &body))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let order: OrderResponse = response.json().await?;
        if !order.success {
            return Err(MarketError::Api("order placement rejected".to_string()));
        }

        debug!("Placed {} order {} for {}", side, order.payload.oid, self.book);
        Ok(order.payload.oid)
    }
}

#[async_trait]
impl MarketData for BitsoClient {
    async fn current_price(&self) -> Result<f64, MarketError> {
        let path = format!("/v3/ticker/?book={}", self.book);
        let response = self.get_json(&path).await?;

        let ticker: TickerResponse = response.json().await?;
        if !ticker.success {
            return Err(MarketError::Api("ticker request rejected".to_string()));
        }

        ticker
            .payload
            .last
            .parse::<f64>()
            .map_err(|e| MarketError::Parse(format!("last={}: {}", ticker.payload.last, e)))
    }

    async fn recent_prices(&self, window: usize) -> Result<Vec<f64>, MarketError> {
        let path = format!("/v3/trades/?book={}&limit={}", self.book, window);
        let response = self.get_json(&path).await?;

        let trades: TradesResponse = response.json().await?;
        if !trades.success {
            return Err(MarketError::Api("trades request rejected".to_string()));
        }

        if trades.payload.len() < window {
            return Err(MarketError::ShortHistory {
                want: window,
                got: trades.payload.len(),
            });
        }

        // The venue returns trades newest first; reverse to oldest first
        let mut prices = Vec::with_capacity(window);
        for trade in trades.payload.iter().take(window).rev() {
            let price = trade
                .price
                .parse::<f64>()
                .map_err(|e| MarketError::Parse(format!("price={}: {}", trade.price, e)))?;
            prices.push(price);
        }

        Ok(prices)
    }
}

// =============================================================================
// Synthetic feed
// =============================================================================

/// Uniformly distributed prices within a band
///
/// Stands in for the venue in tests and `--synthetic` dry runs.
pub struct SyntheticFeed {
    low: f64,
    high: f64,
}

impl SyntheticFeed {
    pub fn new(low: f64, high: f64) -> Self {
        assert!(low > 0.0 && low < high, "invalid synthetic price band");
        Self { low, high }
    }
}

impl Default for SyntheticFeed {
    fn default() -> Self {
        // Band used by the original paper-trading setup
        Self::new(25_000.0, 30_000.0)
    }
}

#[async_trait]
impl MarketData for SyntheticFeed {
    async fn current_price(&self) -> Result<f64, MarketError> {
        Ok(rand::thread_rng().gen_range(self.low..self.high))
    }

    async fn recent_prices(&self, window: usize) -> Result<Vec<f64>, MarketError> {
        let mut rng = rand::thread_rng();
        Ok((0..window).map(|_| rng.gen_range(self.low..self.high)).collect())
    }
}
