//! Keyed catalog datasets.

use std::collections::BTreeMap;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::utils::json_number;

/// One price entry keyed by spec. Serializes with the short keys `c p s r b`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PriceEntry {
    #[serde(rename = "c")]
    pub code: String,

    #[serde(rename = "p", serialize_with = "serialize_price")]
    pub price: f64,

    #[serde(rename = "s")]
    pub special_price: String,

    #[serde(rename = "r")]
    pub note: String,

    /// `None` when the source carried no brand or an empty one
    #[serde(rename = "b", skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

fn serialize_price<S: Serializer>(price: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    json_number(*price).serialize(serializer)
}

/// Price catalog keyed by product specification.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PriceDataset {
    #[serde(rename = "bySpec")]
    pub by_spec: BTreeMap<String, PriceEntry>,
}

impl PriceDataset {
    pub fn len(&self) -> usize {
        self.by_spec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_spec.is_empty()
    }
}

/// Fixed-position tuple `[code, price, specialPriceIndex, noteIndex(, brandIndex)]`.
///
/// Indexes point into [`CompactPriceDataset::strings`]; -1 marks empty text.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactPriceEntry {
    pub code: String,
    pub price: f64,
    pub special_price: i64,
    pub note: i64,
    pub brand: Option<i64>,
}

impl Serialize for CompactPriceEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.brand.is_some() { 5 } else { 4 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.code)?;
        seq.serialize_element(&json_number(self.price))?;
        seq.serialize_element(&self.special_price)?;
        seq.serialize_element(&self.note)?;
        if let Some(brand) = self.brand {
            seq.serialize_element(&brand)?;
        }
        seq.end()
    }
}

/// Dictionary-compacted price catalog; the wire layout of price payloads.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CompactPriceDataset {
    #[serde(rename = "bySpec")]
    pub by_spec: BTreeMap<String, CompactPriceEntry>,
    pub strings: Vec<String>,
}

/// Stock availability keyed by inventory code.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StockDataset {
    #[serde(rename = "byCode")]
    pub by_code: BTreeMap<String, String>,
}

impl StockDataset {
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}
