//! Best-effort push notifications through a JSON webhook (IFTTT Maker style)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::shared::errors::NotifyError;
use crate::shared::types::Eur;

/// Delivery is best effort: implementations log failures and never return them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_price_change(&self, item_name: &str, new_price: Decimal, old_price: Decimal);

    async fn notify_error(&self, message: &str);
}

/// Webhook request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub value1: String,
    pub value2: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value3: Option<String>,
}

impl WebhookPayload {
    pub fn price_change(item_name: &str, new_price: Decimal, old_price: Decimal) -> Self {
        Self {
            value1: item_name.to_string(),
            value2: Eur(new_price).to_string(),
            value3: Some(Eur(old_price).to_string()),
        }
    }

    pub fn error(title: &str, message: &str) -> Self {
        Self {
            value1: title.to_string(),
            value2: message.to_string(),
            value3: None,
        }
    }
}

pub struct WebhookNotifier {
    http_client: Client,
    webhook_url: String,
    error_title: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String, error_title: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http_client, webhook_url, error_title))
    }

    pub fn with_client(http_client: Client, webhook_url: String, error_title: String) -> Self {
        Self {
            http_client,
            webhook_url,
            error_title,
        }
    }

    /// POST `payload`; anything but 200 is a failure.
    pub async fn send(&self, payload: &WebhookPayload) -> Result<(), NotifyError> {
        let response = self.http_client.post(&self.webhook_url).json(payload).send().await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(NotifyError::Status(status.as_u16())),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_price_change(&self, item_name: &str, new_price: Decimal, old_price: Decimal) {
        let payload = WebhookPayload::price_change(item_name, new_price, old_price);
        match self.send(&payload).await {
            Ok(()) => info!("📱 Notification sent for {}!", item_name),
            Err(e) => warn!("⚠️ Error sending price alert for {}: {}", item_name, e),
        }
    }

    async fn notify_error(&self, message: &str) {
        let payload = WebhookPayload::error(&self.error_title, message);
        match self.send(&payload).await {
            Ok(()) => info!("🚨 Sent crash/error alert"),
            Err(e) => warn!("⚠️ Could not send error notification: {}", e),
        }
    }
}
