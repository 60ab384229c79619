//! Last known prices

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::shared::types::{PriceChange, Quote};

/// In-memory last known price per item. Owned by the monitor and rebuilt
/// from scratch on every restart.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    prices: HashMap<String, Quote>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, item_name: &str) -> Option<&Quote> {
        self.prices.get(item_name)
    }

    pub fn price(&self, item_name: &str) -> Option<Decimal> {
        self.get(item_name).map(|q| q.price)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Record `current` for `item_name`.
    ///
    /// The first quote for an item becomes its baseline and is not a change.
    /// A quote equal to the stored price leaves the book untouched.
    /// Otherwise the stored quote is replaced and the change returned.
    pub fn update(&mut self, item_name: &str, current: Quote) -> Option<PriceChange> {
        match self.prices.get_mut(item_name) {
            None => {
                self.prices.insert(item_name.to_string(), current);
                None
            }
            Some(old) if old.price == current.price => None,
            Some(old) => {
                let change = PriceChange {
                    item_name: item_name.to_string(),
                    old: *old,
                    new: current,
                };
                *old = current;
                Some(change)
            }
        }
    }
}
