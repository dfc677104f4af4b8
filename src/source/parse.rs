// src/source/parse.rs

//! Row parsing for csv, json and spreadsheet sources.
//!
//! Every parser yields [`RawRow`]s keyed by header text. Shape differences
//! between sources are left for the normalizers to resolve.

use std::collections::BTreeMap;

use csv::{ReaderBuilder, Trim};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::{PriceDataset, RawRow};
use crate::pipeline::dataset::price_dataset_from_payload;
use crate::utils::{cell_text, format_number};

/// Decode source bytes as UTF-8 text without a leading byte-order mark.
pub fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

/// Parse CSV text into header-keyed rows.
///
/// Blank lines are skipped and the first remaining line is the header. Cells
/// are trimmed, a short line yields "" for its missing columns and columns
/// with a blank header are dropped.
pub fn parse_csv_rows(text: &str) -> Result<Vec<RawRow>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut records = reader.records().filter(|record| match record {
        Ok(record) => record.iter().any(|cell| !cell.is_empty()),
        Err(_) => true,
    });

    let Some(header) = records.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect();

    records
        .map(|record| {
            let record = record.map_err(csv_error)?;
            Ok(headers
                .iter()
                .enumerate()
                .filter(|(_, header)| !header.is_empty())
                .map(|(idx, header)| {
                    let cell = record.get(idx).unwrap_or_default();
                    (header.clone(), cell.to_string())
                })
                .collect())
        })
        .collect()
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::format(format!("invalid CSV source: {e}"))
}

/// The accepted JSON source shapes, classified once.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonDocument {
    /// A bare array of rows or `{ "rows": [...] }`
    Rows(Vec<RawRow>),
    /// A published price payload, `{ "bySpec": {...} }`
    BySpec(PriceDataset),
    /// A published stock payload, `{ "byCode": {...} }`
    ByCode(BTreeMap<String, String>),
}

impl JsonDocument {
    /// Parse and classify a JSON body.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| AppError::format(format!("invalid JSON source: {e}")))?;
        Self::classify(value)
    }

    /// Classify an already-parsed JSON value.
    pub fn classify(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(Self::Rows(rows_from_values(items)?)),
            Value::Object(mut object) => match object.remove("rows") {
                Some(Value::Array(items)) => Ok(Self::Rows(rows_from_values(items)?)),
                Some(_) => Err(AppError::format("JSON field rows must be an array")),
                None if object.contains_key("bySpec") => Ok(Self::BySpec(
                    price_dataset_from_payload(&Value::Object(object))?,
                )),
                None => match object.remove("byCode") {
                    Some(Value::Object(by_code)) => Ok(Self::ByCode(stock_map(by_code))),
                    Some(_) => Err(AppError::format("JSON field byCode must be an object")),
                    None => Err(AppError::format(
                        "Unsupported JSON shape: expected an array, rows, bySpec or byCode",
                    )),
                },
            },
            _ => Err(AppError::format(
                "Unsupported JSON shape: expected an array, rows, bySpec or byCode",
            )),
        }
    }
}

fn rows_from_values(items: Vec<Value>) -> Result<Vec<RawRow>> {
    items
        .into_iter()
        .filter(|item| !item.is_null())
        .map(|item| match item {
            Value::Object(object) => Ok(object
                .iter()
                .map(|(key, value)| (key.trim().to_string(), cell_text(value)))
                .collect()),
            _ => Err(AppError::format("JSON rows must be objects")),
        })
        .collect()
}

fn stock_map(object: Map<String, Value>) -> BTreeMap<String, String> {
    object
        .into_iter()
        .map(|(code, value)| {
            let text = match value {
                Value::String(text) => text,
                other => cell_text(&other),
            };
            (code, text)
        })
        .collect()
}

/// Expand a keyed price dataset back into rows with the standard column names.
pub fn rows_from_price_dataset(dataset: &PriceDataset) -> Vec<RawRow> {
    dataset
        .by_spec
        .iter()
        .map(|(spec, entry)| {
            let mut row = RawRow::new();
            row.insert("代码".to_string(), entry.code.clone());
            row.insert("规格型号".to_string(), spec.clone());
            row.insert("销售单价".to_string(), format_number(entry.price));
            row.insert("补充说明".to_string(), entry.note.clone());
            row.insert("特价".to_string(), entry.special_price.clone());
            if let Some(brand) = &entry.brand {
                row.insert("brand".to_string(), brand.clone());
            }
            row
        })
        .collect()
}

/// Read the first worksheet of a workbook. The first row is the header;
/// blank header cells and blank rows are skipped.
#[cfg(feature = "xlsx")]
pub fn read_xlsx_rows(bytes: &[u8]) -> Result<Vec<RawRow>> {
    use std::io::Cursor;

    use calamine::{Reader, open_workbook_auto_from_rs};

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| AppError::format(format!("cannot open workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::format("workbook has no sheets"))?
        .map_err(|e| AppError::format(format!("cannot read first sheet: {e}")))?;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    let rows = sheet_rows
        .filter_map(|cells| {
            let row: RawRow = headers
                .iter()
                .enumerate()
                .filter(|(_, header)| !header.is_empty())
                .map(|(idx, header)| {
                    let text = cells
                        .get(idx)
                        .map(|cell| cell.to_string().trim().to_string())
                        .unwrap_or_default();
                    (header.clone(), text)
                })
                .collect();
            row.values().any(|v| !v.is_empty()).then_some(row)
        })
        .collect();
    Ok(rows)
}

/// Spreadsheet support is a compile-time feature; without it xlsx sources
/// are a configuration error.
#[cfg(not(feature = "xlsx"))]
pub fn read_xlsx_rows(_bytes: &[u8]) -> Result<Vec<RawRow>> {
    Err(AppError::config(
        "XLSX source detected but spreadsheet support is not compiled in (enable the xlsx feature)",
    ))
}
