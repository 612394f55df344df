//! Parsing of the decorated price text shown on a deck page.
//!
//! The price field looks like `Cardmarket€45.00 (≈ $50.12)`: an optional
//! provider label, the currency symbol, the amount, and an optional
//! parenthetical conversion to another currency.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::{Result, ScraperError};

/// The currency every session normalises the page to.
pub const CANONICAL_CURRENCY: char = '€';

/// Whether the price text is already shown in the canonical currency.
///
/// Only the part before the conversion hint counts.
pub fn is_canonical(text: &str) -> bool {
    primary_part(text).contains(CANONICAL_CURRENCY)
}

fn primary_part(text: &str) -> &str {
    text.split('(').next().unwrap_or_default()
}

/// Extract the amount from a price string.
///
/// Drops the parenthetical suffix, everything up to and including the
/// currency symbol, surrounding whitespace and thousands separators.
pub fn parse_price(text: &str) -> Result<Decimal> {
    let head = primary_part(text);
    let amount = match head.rfind(CANONICAL_CURRENCY) {
        Some(idx) => &head[idx + CANONICAL_CURRENCY.len_utf8()..],
        None => head,
    };
    let cleaned: String = amount.trim().chars().filter(|c| *c != ',').collect();

    Decimal::from_str(&cleaned).map_err(|_| ScraperError::PriceParse {
        raw: text.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
