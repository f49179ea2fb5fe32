use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::cache::Cache;
use crate::core::price::{PriceProvider, PriceQuote};

// YahooFinanceProvider implementation for PriceProvider
pub struct YahooFinanceProvider {
    base_url: String,
    cache: Arc<Cache<String, PriceQuote>>,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, cache: Arc<Cache<String, PriceQuote>>) -> Self {
        YahooFinanceProvider {
            base_url: base_url.to_string(),
            cache,
        }
    }
}

#[derive(Deserialize, Debug)]
struct YahooPriceResponse {
    chart: PriceChartResult,
}

#[derive(Deserialize, Debug)]
struct PriceChartResult {
    result: Vec<PriceChartItem>,
}

#[derive(Deserialize, Debug)]
struct PriceChartItem {
    meta: PriceChartMeta,
}

#[derive(Deserialize, Debug)]
struct PriceChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: f64,
    currency: String,
}

#[async_trait]
impl PriceProvider for YahooFinanceProvider {
    #[instrument(
        name = "YahooPriceFetch",
        skip(self),
        fields(ticker = %ticker)
    )]
    async fn fetch_price(&self, ticker: &str) -> Result<PriceQuote> {
        if let Some(cached) = self.cache.get(&ticker.to_string()).await {
            return Ok(cached);
        }

        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&range=1d",
            self.base_url, ticker
        );
        debug!("Requesting price data from {}", url);

        let client = reqwest::Client::builder().user_agent("folio/1.0").build()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for ticker: {} URL: {}", e, ticker, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for ticker: {}",
                response.status(),
                ticker
            ));
        }

        let body = response.text().await?;
        let data: YahooPriceResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Failed to parse JSON response for ticker {}: {}", ticker, e))?;
        let item = data
            .chart
            .result
            .first()
            .ok_or_else(|| anyhow!("No price data found for ticker: {}", ticker))?;

        let quote = PriceQuote {
            price: item.meta.regular_market_price,
            currency: item.meta.currency.clone(),
        };

        self.cache.put(ticker.to_string(), quote.clone()).await;

        Ok(quote)
    }
}
