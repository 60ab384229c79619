//! Price change analysis

use rust_decimal::Decimal;

use crate::shared::types::PriceChange;

/// True if both prices are known and differ by at least `threshold`.
pub fn check_price_change(old_price: Option<Decimal>, new_price: Option<Decimal>, threshold: Decimal) -> bool {
    match (old_price, new_price) {
        (Some(old), Some(new)) => new.saturating_sub(old).abs() >= threshold,
        _ => false,
    }
}

/// Decides which price changes deserve a push notification
#[derive(Debug, Clone, Copy)]
pub struct PriceAnalyzer {
    threshold: Decimal,
}

impl PriceAnalyzer {
    pub fn new(threshold: Decimal) -> Self {
        Self { threshold }
    }

    pub fn is_significant(&self, change: &PriceChange) -> bool {
        check_price_change(Some(change.old.price), Some(change.new.price), self.threshold)
    }
}
