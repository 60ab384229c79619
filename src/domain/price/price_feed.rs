//! Price fetching with bounded retries

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::price_parser::parse_price;
use crate::shared::errors::FetchError;
use crate::shared::types::{ItemConfig, PriceObservation};

/// Body of a market `priceoverview` response. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarketQuote {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub lowest_price: Option<String>,
}

impl MarketQuote {
    /// The price text, if the response signals success and carries one.
    pub fn price_text(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.lowest_price.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Transport used by the fetcher to reach a price endpoint
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_quote(&self, url: &str) -> Result<MarketQuote, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub retry_delay: Duration,
    pub usd_to_eur_rate: Decimal,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(2),
            usd_to_eur_rate: Decimal::new(93, 2),
        }
    }
}

/// Fetches and normalizes item prices
pub struct PriceFetcher {
    source: Arc<dyn PriceSource>,
    config: FetchConfig,
}

impl PriceFetcher {
    pub fn new(source: Arc<dyn PriceSource>, config: FetchConfig) -> Self {
        Self { source, config }
    }

    /// Current EUR price at `url`, or `None` when it is unavailable.
    ///
    /// Transport failures and unsuccessful responses are retried up to
    /// `max_attempts` times. A price that cannot be parsed ends the fetch
    /// immediately.
    pub async fn fetch(&self, url: &str) -> Option<Decimal> {
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            match self.source.fetch_quote(url).await {
                Ok(quote) => match quote.price_text() {
                    Some(text) => {
                        return match parse_price(text, self.config.usd_to_eur_rate) {
                            Ok(price) => {
                                debug!("Fetched price {} from '{}'", price, text);
                                Some(price)
                            }
                            Err(e) => {
                                warn!("⚠️ Invalid price format '{}' ({}), skipping this check", text, e);
                                None
                            }
                        };
                    }
                    None => warn!("⚠️ Attempt {}/{}: no valid price, retrying...", attempt, max_attempts),
                },
                Err(e) => warn!("⚠️ Attempt {}/{}: error fetching price: {}", attempt, max_attempts, e),
            }

            if attempt < max_attempts {
                sleep(self.config.retry_delay).await;
            }
        }

        warn!("❌ Failed to get a valid price after {} attempts", max_attempts);
        None
    }

    pub async fn observe(&self, item: &ItemConfig) -> PriceObservation {
        let price = self.fetch(&item.url).await;
        PriceObservation {
            item_name: item.name.clone(),
            price,
            observed_at: Local::now(),
        }
    }
}
