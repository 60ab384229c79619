//! Price string normalization

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::shared::errors::ParseError;

/// Turn a market price string such as `"$12.34"`, `"10,50€"` or `"12,--€"`
/// into a EUR amount. Dollar prices are converted with `usd_to_eur_rate`
/// and rounded to cents.
pub fn parse_price(raw: &str, usd_to_eur_rate: Decimal) -> Result<Decimal, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let number = normalize_number(raw);
    let value = Decimal::from_str(&number).map_err(|_| ParseError::InvalidFormat(raw.to_string()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ParseError::Negative(raw.to_string()));
    }

    if raw.contains('$') {
        let converted = value
            .checked_mul(usd_to_eur_rate)
            .ok_or_else(|| ParseError::InvalidFormat(raw.to_string()))?;
        Ok(converted.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    } else {
        Ok(value)
    }
}

/// Strip currency symbols, the `--` placeholder and whitespace, and rewrite
/// the decimal separator as `.`.
///
/// When both `,` and `.` appear the right-most one is the decimal separator
/// and the other one groups thousands. A lone `,` is a decimal separator.
pub fn normalize_number(raw: &str) -> String {
    let stripped: String = raw
        .replace("--", "")
        .chars()
        .filter(|c| !matches!(c, '$' | '€') && !c.is_whitespace())
        .collect();

    let decimal_sep = match (stripped.rfind(','), stripped.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => ',',
        (Some(_), None) => ',',
        _ => '.',
    };
    let group_sep = if decimal_sep == ',' { '.' } else { ',' };

    let mut number: String = stripped
        .chars()
        .filter(|&c| c != group_sep)
        .map(|c| if c == decimal_sep { '.' } else { c })
        .collect();

    // "12,--€" leaves a dangling separator
    if number.ends_with('.') {
        number.pop();
    }
    number
}
