// src/pipeline/hash.rs

//! Canonical serialization and SHA-256 change detection.
//!
//! Both dataset types keep their entries in `BTreeMap`s, so serializing them
//! already yields lexicographically sorted keys and a fixed field order. The
//! hash therefore depends only on data, never on source ordering or metadata.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{PriceDataset, StockDataset};

/// Lower-case hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Canonical JSON of a price dataset: sorted specs, fields `c, p, s, r, b`.
pub fn canonical_price_json(dataset: &PriceDataset) -> Result<String> {
    Ok(serde_json::to_string(dataset)?)
}

pub fn hash_price(dataset: &PriceDataset) -> Result<String> {
    Ok(sha256_hex(canonical_price_json(dataset)?.as_bytes()))
}

/// Canonical JSON of a stock dataset: sorted codes.
pub fn canonical_stock_json(dataset: &StockDataset) -> Result<String> {
    Ok(serde_json::to_string(dataset)?)
}

pub fn hash_stock(dataset: &StockDataset) -> Result<String> {
    Ok(sha256_hex(canonical_stock_json(dataset)?.as_bytes()))
}
