//! Row shapes flowing between parsing and normalization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One source row: column name to trimmed cell text.
pub type RawRow = BTreeMap<String, String>;

/// A price row mapped onto the fixed schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPriceRow {
    pub code: String,
    pub spec: String,
    /// Always finite; unparsable input becomes 0
    pub price: f64,
    pub name: String,
    pub mnemonic: String,
    pub note: String,
    pub alias: String,
    pub special_price: String,
    /// Only present when the source has a `brand` column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

/// One `<warehouse>:<quantity>[(status)]` availability fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockFragment {
    pub code: String,
    pub text: String,
}
