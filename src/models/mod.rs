// src/models/mod.rs

//! Domain models for catalog synchronization.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod bundle;
mod config;
mod dataset;
mod row;
mod source;

// Re-export all public types
pub use bundle::{Bundle, BundleMeta, Manifest};
pub use config::{AppPaths, BundleLimits, SourceConfig, SourceSchema, SyncMode, SystemConfig};
pub use dataset::{CompactPriceDataset, CompactPriceEntry, PriceDataset, PriceEntry, StockDataset};
pub use row::{NormalizedPriceRow, RawRow, StockFragment};
pub use source::SourceKind;
