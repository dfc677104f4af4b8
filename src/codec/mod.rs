// src/codec/mod.rs

//! Bundle encoding: plain or encrypted payloads with self-describing metadata.
//!
//! Price payloads are always written in the dictionary-compacted layout and
//! may be encrypted. Stock payloads are always plain.

pub mod crypto;
pub mod script;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Bundle, BundleMeta, PriceDataset, StockDataset};
use crate::pipeline::dataset::{
    compact_price, price_dataset_from_payload, stock_dataset_from_payload,
};

pub use crypto::{decrypt_text, encrypt_text};
pub use script::{from_script, to_script};

/// Global variable holding the price bundle.
pub const PRICE_BUNDLE_VAR: &str = "PRICE_BUNDLE";
/// Global variable holding the stock bundle.
pub const STOCK_BUNDLE_VAR: &str = "STOCK_BUNDLE";

/// Current time as an ISO 8601 UTC timestamp with milliseconds.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Trimmed password, `None` when absent or blank.
pub fn effective_password(password: Option<&str>) -> Option<&str> {
    password.map(str::trim).filter(|p| !p.is_empty())
}

fn new_meta(row_count: usize) -> BundleMeta {
    BundleMeta {
        generated_at: timestamp_now(),
        row_count,
        ..BundleMeta::default()
    }
}

fn decode_plain(payload: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::format(format!("bundle payload is not base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::format(format!("bundle payload is not UTF-8: {e}")))
}

fn parse_payload(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(text)
        .map_err(|e| AppError::format(format!("bundle payload is not JSON: {e}")))
}

/// Encode a price dataset. A non-blank password encrypts the payload.
pub fn encode_price(dataset: &PriceDataset, password: Option<&str>) -> Result<Bundle> {
    let json = serde_json::to_string(&compact_price(dataset))?;
    let (secured, payload) = match effective_password(password) {
        Some(password) => (true, encrypt_text(&json, password)?),
        None => (false, STANDARD.encode(json.as_bytes())),
    };
    Ok(Bundle {
        secured,
        payload,
        meta: new_meta(dataset.len()),
    })
}

/// Decode a price bundle, either payload layout.
pub fn decode_price(bundle: &Bundle, password: Option<&str>) -> Result<PriceDataset> {
    let text = if bundle.secured {
        let password = effective_password(password)
            .ok_or_else(|| AppError::crypto("Price bundle password is required"))?;
        decrypt_text(&bundle.payload, password)?
    } else {
        decode_plain(&bundle.payload)?
    };
    price_dataset_from_payload(&parse_payload(&text)?)
}

/// Encode a stock dataset as a plain bundle.
pub fn encode_stock(dataset: &StockDataset) -> Result<Bundle> {
    let json = serde_json::to_string(dataset)?;
    Ok(Bundle {
        secured: false,
        payload: STANDARD.encode(json.as_bytes()),
        meta: new_meta(dataset.len()),
    })
}

/// Decode a stock bundle. Secured stock bundles are refused.
pub fn decode_stock(bundle: &Bundle) -> Result<StockDataset> {
    if bundle.secured {
        return Err(AppError::crypto("Stock bundle must remain plain; refusing a secured bundle"));
    }
    stock_dataset_from_payload(&parse_payload(&decode_plain(&bundle.payload)?)?)
}
