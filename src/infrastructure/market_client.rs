//! HTTP transport for market price endpoints

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::domain::price::{MarketQuote, PriceSource};
use crate::shared::errors::FetchError;

/// Market price client. One GET per attempt, bounded by `timeout`.
pub struct HttpPriceSource {
    http_client: Client,
}

impl HttpPriceSource {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pricewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http_client))
    }

    /// Use a preconfigured client, e.g. one with its own proxy settings.
    pub fn with_client(http_client: Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch_quote(&self, url: &str) -> Result<MarketQuote, FetchError> {
        debug!("GET {}", url);

        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        Ok(response.json::<MarketQuote>().await?)
    }
}
