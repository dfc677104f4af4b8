// src/pipeline/catalog.rs

//! Per-catalog behavior plugged into the sync orchestrator.
//!
//! A [`Catalog`] knows how to turn a fetched body into its dataset, how to
//! hash it and how to move it in and out of a [`Bundle`].

use crate::codec::{
    PRICE_BUNDLE_VAR, STOCK_BUNDLE_VAR, decode_price, decode_stock, effective_password,
    encode_price, encode_stock, from_script,
};
use crate::error::{AppError, Result};
use crate::models::{Bundle, PriceDataset, RawRow, SourceKind, StockDataset, SyncMode};
use crate::normalize::{normalize_price_rows, normalize_stock_rows};
use crate::pipeline::dataset::{build_price_dataset, build_stock_dataset};
use crate::pipeline::hash::{hash_price, hash_stock};
use crate::source::{
    JsonDocument, decode_text, parse_csv_rows, read_xlsx_rows, rows_from_price_dataset,
};

/// One synchronizable catalog.
pub trait Catalog: Send + Sync {
    type Dataset: Send + Sync;

    /// Lower-case name used in messages (`price`, `stock`).
    fn label(&self) -> &'static str;

    /// Global variable the bundle script assigns.
    fn bundle_var(&self) -> &'static str;

    fn mode(&self) -> SyncMode;

    /// Parse and normalize a fetched body of an allowed kind.
    fn build(&self, kind: SourceKind, body: &[u8]) -> Result<Self::Dataset>;

    fn data_hash(&self, dataset: &Self::Dataset) -> Result<String>;

    fn row_count(&self, dataset: &Self::Dataset) -> usize;

    fn encode(&self, dataset: &Self::Dataset) -> Result<Bundle>;

    /// Decode a previously written bundle under the current mode.
    fn decode(&self, bundle: &Bundle) -> Result<Self::Dataset>;
}

/// Rows for the tabular kinds shared by both catalogs.
fn tabular_rows(kind: SourceKind, body: &[u8]) -> Result<Option<Vec<RawRow>>> {
    match kind {
        SourceKind::Csv => parse_csv_rows(&decode_text(body)).map(Some),
        SourceKind::Xlsx => read_xlsx_rows(body).map(Some),
        _ => Ok(None),
    }
}

fn unsupported(label: &str, kind: SourceKind) -> AppError {
    AppError::format(format!("Unsupported {label} source type: {kind}"))
}

/// The price catalog: encrypted or plain output.
#[derive(Debug, Clone)]
pub struct PriceCatalog {
    mode: SyncMode,
    password: Option<String>,
}

impl PriceCatalog {
    /// Encrypted mode requires a non-blank password.
    pub fn new(mode: SyncMode, password: Option<String>) -> Result<Self> {
        let password = effective_password(password.as_deref()).map(str::to_string);
        if mode.is_secured() && password.is_none() {
            return Err(AppError::config(
                "Missing PRICE_BUNDLE_PASSWORD for encrypted mode",
            ));
        }
        Ok(Self { mode, password })
    }

    fn price_rows(&self, kind: SourceKind, body: &[u8]) -> Result<Vec<RawRow>> {
        if let Some(rows) = tabular_rows(kind, body)? {
            return Ok(rows);
        }
        match kind {
            SourceKind::Json => match JsonDocument::parse(&decode_text(body))? {
                JsonDocument::Rows(rows) => Ok(rows),
                JsonDocument::BySpec(dataset) => Ok(rows_from_price_dataset(&dataset)),
                JsonDocument::ByCode(_) => Err(AppError::format(
                    "price JSON source holds a stock payload (byCode)",
                )),
            },
            SourceKind::Js => {
                let bundle = from_script(&decode_text(body), PRICE_BUNDLE_VAR)?;
                let dataset = decode_price(&bundle, self.password.as_deref())?;
                Ok(rows_from_price_dataset(&dataset))
            }
            other => Err(unsupported(self.label(), other)),
        }
    }
}

impl Catalog for PriceCatalog {
    type Dataset = PriceDataset;

    fn label(&self) -> &'static str {
        "price"
    }

    fn bundle_var(&self) -> &'static str {
        PRICE_BUNDLE_VAR
    }

    fn mode(&self) -> SyncMode {
        self.mode
    }

    fn build(&self, kind: SourceKind, body: &[u8]) -> Result<PriceDataset> {
        let rows = self.price_rows(kind, body)?;
        Ok(build_price_dataset(&normalize_price_rows(&rows)))
    }

    fn data_hash(&self, dataset: &PriceDataset) -> Result<String> {
        hash_price(dataset)
    }

    fn row_count(&self, dataset: &PriceDataset) -> usize {
        dataset.len()
    }

    fn encode(&self, dataset: &PriceDataset) -> Result<Bundle> {
        let password = match self.mode {
            SyncMode::Encrypted => self.password.as_deref(),
            SyncMode::Plain => None,
        };
        encode_price(dataset, password)
    }

    fn decode(&self, bundle: &Bundle) -> Result<PriceDataset> {
        if bundle.secured != self.mode.is_secured() {
            return Err(AppError::format(format!(
                "existing price bundle does not match mode {}",
                self.mode
            )));
        }
        decode_price(bundle, self.password.as_deref())
    }
}

/// The stock catalog: always plain.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockCatalog;

impl StockCatalog {
    fn stock_dataset(&self, kind: SourceKind, body: &[u8]) -> Result<StockDataset> {
        if let Some(rows) = tabular_rows(kind, body)? {
            return Ok(build_stock_dataset(&normalize_stock_rows(&rows)));
        }
        match kind {
            SourceKind::Json => match JsonDocument::parse(&decode_text(body))? {
                JsonDocument::Rows(rows) => Ok(build_stock_dataset(&normalize_stock_rows(&rows))),
                JsonDocument::ByCode(by_code) => Ok(StockDataset { by_code }),
                JsonDocument::BySpec(_) => Err(AppError::format(
                    "stock JSON source holds a price payload (bySpec)",
                )),
            },
            SourceKind::Js => decode_stock(&from_script(&decode_text(body), STOCK_BUNDLE_VAR)?),
            other => Err(unsupported(self.label(), other)),
        }
    }
}

impl Catalog for StockCatalog {
    type Dataset = StockDataset;

    fn label(&self) -> &'static str {
        "stock"
    }

    fn bundle_var(&self) -> &'static str {
        STOCK_BUNDLE_VAR
    }

    fn mode(&self) -> SyncMode {
        SyncMode::Plain
    }

    fn build(&self, kind: SourceKind, body: &[u8]) -> Result<StockDataset> {
        self.stock_dataset(kind, body)
    }

    fn data_hash(&self, dataset: &StockDataset) -> Result<String> {
        hash_stock(dataset)
    }

    fn row_count(&self, dataset: &StockDataset) -> usize {
        dataset.len()
    }

    fn encode(&self, dataset: &StockDataset) -> Result<Bundle> {
        encode_stock(dataset)
    }

    fn decode(&self, bundle: &Bundle) -> Result<StockDataset> {
        decode_stock(bundle)
    }
}
