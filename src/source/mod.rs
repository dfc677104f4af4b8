// src/source/mod.rs

//! Source retrieval, kind detection and row parsing.

pub mod detect;
pub mod fetch;
pub mod parse;

pub use detect::{detect_source_kind, ensure_kind_allowed};
pub use fetch::{FetchOutcome, FetchRequest, HttpFetcher, SourceFetcher, SourceResponse};
pub use parse::{
    JsonDocument, decode_text, parse_csv_rows, read_xlsx_rows, rows_from_price_dataset,
};
