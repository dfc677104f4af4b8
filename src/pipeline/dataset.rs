// src/pipeline/dataset.rs

//! Keyed dataset construction and dictionary compaction.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{
    CompactPriceDataset, CompactPriceEntry, NormalizedPriceRow, PriceDataset, PriceEntry,
    StockDataset, StockFragment,
};
use crate::normalize::parse_money;
use crate::utils::cell_text;

/// Separator between availability fragments of one code.
pub const FRAGMENT_SEPARATOR: &str = " | ";

/// Key price rows by spec. Rows without a spec are dropped and a later row
/// replaces an earlier one with the same spec.
pub fn build_price_dataset(rows: &[NormalizedPriceRow]) -> PriceDataset {
    let mut by_spec = BTreeMap::new();
    for row in rows {
        let spec = row.spec.trim();
        if spec.is_empty() {
            continue;
        }
        let price = if row.price.is_finite() { row.price } else { 0.0 };
        by_spec.insert(
            spec.to_string(),
            PriceEntry {
                code: row.code.trim().to_string(),
                price,
                special_price: row.special_price.trim().to_string(),
                note: row.note.trim().to_string(),
                brand: row
                    .brand
                    .as_deref()
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(str::to_string),
            },
        );
    }
    PriceDataset { by_spec }
}

/// Insertion-ordered dictionary of long text values.
#[derive(Debug, Default)]
struct StringTable {
    strings: Vec<String>,
    index: HashMap<String, i64>,
}

impl StringTable {
    /// Index of `text`, adding it on first sight. Empty text is -1.
    fn intern(&mut self, text: &str) -> i64 {
        let key = text.trim();
        if key.is_empty() {
            return -1;
        }
        if let Some(idx) = self.index.get(key) {
            return *idx;
        }
        let idx = self.strings.len() as i64;
        self.strings.push(key.to_string());
        self.index.insert(key.to_string(), idx);
        idx
    }
}

/// Replace special price, note and brand text with dictionary indexes.
/// Within an entry the special price is interned before the note.
pub fn compact_price(dataset: &PriceDataset) -> CompactPriceDataset {
    let mut table = StringTable::default();
    let by_spec = dataset
        .by_spec
        .iter()
        .map(|(spec, entry)| {
            let special_price = table.intern(&entry.special_price);
            let note = table.intern(&entry.note);
            let brand = entry
                .brand
                .as_deref()
                .map(|b| table.intern(b))
                .filter(|idx| *idx >= 0);
            let compact = CompactPriceEntry {
                code: entry.code.clone(),
                price: entry.price,
                special_price,
                note,
                brand,
            };
            (spec.clone(), compact)
        })
        .collect();

    CompactPriceDataset {
        by_spec,
        strings: table.strings,
    }
}

/// Resolve dictionary indexes back into text.
pub fn expand_price(compact: &CompactPriceDataset) -> Result<PriceDataset> {
    let lookup = |idx: i64| resolve_index(&compact.strings, idx);
    let by_spec = compact
        .by_spec
        .iter()
        .map(|(spec, entry)| -> Result<(String, PriceEntry)> {
            let brand = match entry.brand {
                Some(idx) => Some(lookup(idx)?).filter(|b| !b.is_empty()),
                None => None,
            };
            let expanded = PriceEntry {
                code: entry.code.clone(),
                price: entry.price,
                special_price: lookup(entry.special_price)?,
                note: lookup(entry.note)?,
                brand,
            };
            Ok((spec.clone(), expanded))
        })
        .collect::<Result<_>>()?;
    Ok(PriceDataset { by_spec })
}

fn resolve_index(strings: &[String], idx: i64) -> Result<String> {
    match idx {
        -1 => Ok(String::new()),
        i if i >= 0 && (i as usize) < strings.len() => Ok(strings[i as usize].clone()),
        i => Err(AppError::format(format!(
            "string index {i} out of range (dictionary has {} entries)",
            strings.len()
        ))),
    }
}

/// Read a price payload `{bySpec, strings?}` whose entries are either compact
/// tuples or expanded `{c, p, s, r, b}` objects. A missing `bySpec` is an
/// empty dataset.
pub fn price_dataset_from_payload(payload: &Value) -> Result<PriceDataset> {
    let by_spec = match payload.get("bySpec") {
        None | Some(Value::Null) => return Ok(PriceDataset::default()),
        Some(Value::Object(by_spec)) => by_spec,
        Some(_) => return Err(AppError::format("bySpec must be an object")),
    };
    let strings: Vec<String> = match payload.get("strings") {
        Some(Value::Array(items)) => items.iter().map(cell_text).collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(_) => return Err(AppError::format("strings must be an array")),
    };

    let mut compact = CompactPriceDataset {
        by_spec: BTreeMap::new(),
        strings,
    };
    let mut expanded = BTreeMap::new();

    for (spec, value) in by_spec {
        match value {
            Value::Array(tuple) => {
                compact
                    .by_spec
                    .insert(spec.clone(), compact_entry_from_tuple(spec, tuple)?);
            }
            Value::Object(fields) => {
                let field = |key: &str| fields.get(key).map(cell_text).unwrap_or_default();
                let entry = PriceEntry {
                    code: field("c"),
                    price: fields.get("p").map(price_value).unwrap_or(0.0),
                    special_price: field("s"),
                    note: field("r"),
                    brand: Some(field("b")).filter(|b| !b.is_empty()),
                };
                expanded.insert(spec.clone(), entry);
            }
            _ => {
                return Err(AppError::format(format!(
                    "bySpec entry {spec} must be an array or an object"
                )));
            }
        }
    }

    let mut dataset = expand_price(&compact)?;
    dataset.by_spec.extend(expanded);
    Ok(dataset)
}

fn compact_entry_from_tuple(spec: &str, tuple: &[Value]) -> Result<CompactPriceEntry> {
    if tuple.len() < 4 {
        return Err(AppError::format(format!(
            "bySpec entry {spec} must have at least 4 elements"
        )));
    }
    let index = |pos: usize| -> Result<i64> {
        match &tuple[pos] {
            Value::Null => Ok(-1),
            value => value.as_i64().ok_or_else(|| {
                AppError::format(format!("bySpec entry {spec} has a non-integer index"))
            }),
        }
    };
    Ok(CompactPriceEntry {
        code: cell_text(&tuple[0]),
        price: price_value(&tuple[1]),
        special_price: index(2)?,
        note: index(3)?,
        brand: if tuple.len() > 4 { Some(index(4)?) } else { None },
    })
}

fn price_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|p| p.is_finite()).unwrap_or(0.0),
        other => parse_money(&cell_text(other)),
    }
}

/// Group fragments by code, joined in input order.
pub fn build_stock_dataset(fragments: &[StockFragment]) -> StockDataset {
    let mut grouped: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for fragment in fragments {
        grouped
            .entry(fragment.code.clone())
            .or_default()
            .push(&fragment.text);
    }
    StockDataset {
        by_code: grouped
            .into_iter()
            .map(|(code, texts)| (code, texts.join(FRAGMENT_SEPARATOR)))
            .collect(),
    }
}

/// Read a stock payload `{byCode}`. A missing `byCode` is an empty dataset.
pub fn stock_dataset_from_payload(payload: &Value) -> Result<StockDataset> {
    match payload.get("byCode") {
        None | Some(Value::Null) => Ok(StockDataset::default()),
        Some(Value::Object(by_code)) => Ok(StockDataset {
            by_code: by_code
                .iter()
                .map(|(code, value)| {
                    let text = match value {
                        Value::String(text) => text.clone(),
                        other => cell_text(other),
                    };
                    (code.clone(), text)
                })
                .collect(),
        }),
        Some(_) => Err(AppError::format("byCode must be an object")),
    }
}
