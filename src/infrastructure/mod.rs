//! Infrastructure - HTTP clients and log files

pub mod change_log;
pub mod market_client;
pub mod notifier;

pub use change_log::ChangeLog;
pub use market_client::HttpPriceSource;
pub use notifier::{Notifier, WebhookNotifier, WebhookPayload};
