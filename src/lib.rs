//! pricewatch - market price watcher
//! Polls item prices, logs every change and pushes alerts for large moves

pub mod domain;
pub mod infrastructure;
pub mod application;
pub mod shared;

// Re-export main types for convenience
pub use application::{PriceMonitor, Supervisor};
pub use domain::price::{PriceBook, PriceFetcher};
pub use infrastructure::{ChangeLog, WebhookNotifier};
pub use shared::config::Config;
