// src/normalize/mod.rs

//! Normalizers mapping loosely shaped rows onto the price and stock schemas.

pub mod price;
pub mod stock;

use std::sync::LazyLock;

use regex::Regex;

use crate::models::RawRow;

pub use price::{STANDARD_PRICE_COLUMNS, normalize_price_rows, parse_money};
pub use stock::normalize_stock_rows;

static GENERIC_COLUMN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^列(\d+)$").unwrap());

/// Positional placeholder columns (`列1`, `列2`, ...) sorted by number, or
/// `None` unless every column of the row is one.
pub fn generic_columns(row: &RawRow) -> Option<Vec<String>> {
    if row.is_empty() {
        return None;
    }
    let mut numbered = row
        .keys()
        .map(|key| {
            let caps = GENERIC_COLUMN.captures(key)?;
            let number = caps[1].parse::<u64>().ok()?;
            Some((number, key.clone()))
        })
        .collect::<Option<Vec<_>>>()?;
    numbered.sort();
    Some(numbered.into_iter().map(|(_, key)| key).collect())
}
