//! Exchange rate provider backed by the public exchangerate-api.com
//! service.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::cache::Cache;
use crate::core::currency::CurrencyRateProvider;

pub struct ExchangeRateProvider {
    base_url: String,
    cache: Arc<Cache<String, f64>>,
}

impl ExchangeRateProvider {
    pub fn new(base_url: &str, cache: Arc<Cache<String, f64>>) -> Self {
        ExchangeRateProvider {
            base_url: base_url.to_string(),
            cache,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: HashMap<String, f64>,
}

#[async_trait]
impl CurrencyRateProvider for ExchangeRateProvider {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        if from == to {
            return Ok(1.0);
        }

        let pair = format!("{from}:{to}");
        if let Some(cached) = self.cache.get(&pair).await {
            return Ok(cached);
        }

        let url = format!("{}/v4/latest/{}", self.base_url, from);
        debug!("Requesting exchange rates from {}", url);

        let client = reqwest::Client::builder().user_agent("folio/1.0").build()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for currency pair: {}", e, pair))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for currency pair: {}",
                response.status(),
                pair
            ));
        }

        let body = response.text().await?;
        let data: LatestRatesResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Failed to parse rates response for {}: {}", from, e))?;

        let rate = *data
            .rates
            .get(to)
            .ok_or_else(|| anyhow!("No rate found for currency pair: {}", pair))?;

        self.cache.put(pair, rate).await;
        Ok(rate)
    }
}
