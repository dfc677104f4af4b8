// src/lib.rs

//! Catalog sync library: pulls price and stock catalogs from loosely typed
//! sources and publishes them as versioned bundle scripts.

pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod source;
pub mod storage;
pub mod utils;
