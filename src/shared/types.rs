//! Common types used across the application

use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;

/// A watched market item
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemConfig {
    /// Unique display name, also the change log key
    pub name: String,
    /// Price source endpoint
    pub url: String,
}

/// Price in EUR, always shown with two decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Eur(pub Decimal);

impl fmt::Display for Eur {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} €", self.0)
    }
}

/// A successfully fetched price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub price: Decimal,
    pub observed_at: DateTime<Local>,
}

impl Quote {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            observed_at: Local::now(),
        }
    }

    pub fn at(price: Decimal, observed_at: DateTime<Local>) -> Self {
        Self { price, observed_at }
    }
}

/// Outcome of one fetch for one item
#[derive(Debug, Clone)]
pub struct PriceObservation {
    pub item_name: String,
    pub price: Option<Decimal>,
    pub observed_at: DateTime<Local>,
}

impl PriceObservation {
    pub fn quote(&self) -> Option<Quote> {
        self.price.map(|price| Quote::at(price, self.observed_at))
    }
}

/// A detected change between the last known and the current price
#[derive(Debug, Clone)]
pub struct PriceChange {
    pub item_name: String,
    pub old: Quote,
    pub new: Quote,
}

impl PriceChange {
    pub fn difference(&self) -> Decimal {
        self.new.price.saturating_sub(self.old.price).abs()
    }
}
