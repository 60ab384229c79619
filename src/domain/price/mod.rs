//! Price domain - fetching, normalizing and comparing item prices

mod price_analyzer;
mod price_book;
mod price_feed;
mod price_parser;

pub use price_analyzer::{check_price_change, PriceAnalyzer};
pub use price_book::PriceBook;
pub use price_feed::{FetchConfig, MarketQuote, PriceFetcher, PriceSource};
pub use price_parser::{normalize_number, parse_price};

#[cfg(test)]
pub(crate) use price_feed::tests as test_support;
