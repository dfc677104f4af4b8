//! Pipeline stages and entry points.
//!
//! - `run_sync`: fetch, normalize, hash and (re)write one catalog bundle
//! - `publish_bundle`: copy a finished bundle to a content-addressed path
//! - `run_validate`: load every config and check bundle size budgets

pub mod catalog;
pub mod dataset;
pub mod hash;
pub mod publish;
pub mod sync;
pub mod validate;

pub use catalog::{Catalog, PriceCatalog, StockCatalog};
pub use publish::{PublishReport, publish_bundle};
pub use sync::{SyncContext, SyncReport, run_sync};
pub use validate::{SizeCheck, ValidateTargets, run_validate};
