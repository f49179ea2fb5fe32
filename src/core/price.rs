//! Pricing abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A current market price for one instrument, in the currency the
/// market quotes it in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub currency: String,
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_price(&self, ticker: &str) -> Result<PriceQuote>;
}
