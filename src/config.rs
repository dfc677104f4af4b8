// src/config.rs

//! Configuration loading utilities.
//!
//! Config documents may be JSON or TOML, chosen by file extension. Source
//! configs are checked against their schema document on the raw value, before
//! defaults are applied.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{SourceConfig, SourceKind, SourceSchema, SystemConfig};

/// Kinds a price source accepts when its config lists none.
pub const PRICE_DEFAULT_KINDS: [SourceKind; 1] = [SourceKind::Xlsx];

/// Kinds a stock source accepts when its config lists none.
pub const STOCK_DEFAULT_KINDS: [SourceKind; 4] = SourceKind::DATA_KINDS;

/// Load a config document as a JSON value.
pub fn load_document(path: &Path) -> Result<Value> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Err(e) => return Err(AppError::Io(e)),
    };

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        Ok(toml::from_str(&text)?)
    } else {
        Ok(serde_json::from_str(&text)?)
    }
}

fn load_typed<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let document = load_document(path)?;
    serde_json::from_value(document)
        .map_err(|e| AppError::config(format!("Invalid config {}: {e}", path.display())))
}

/// Load and validate the system config.
pub fn load_system_config(path: &Path) -> Result<SystemConfig> {
    let config: SystemConfig = load_typed(path)?;
    config.validate()?;
    log::debug!("Loaded system config from {}", path.display());
    Ok(config)
}

/// Load a source schema document.
pub fn load_schema(path: &Path) -> Result<SourceSchema> {
    load_typed(path)
}

/// Load a source config, check it against `schema_path` when given, fill in
/// `default_kinds` and validate the result.
pub fn load_source_config(
    path: &Path,
    schema_path: Option<&Path>,
    default_kinds: &[SourceKind],
) -> Result<SourceConfig> {
    let document = load_document(path)?;
    if let Some(schema_path) = schema_path {
        load_schema(schema_path)?
            .check(&document)
            .map_err(|e| AppError::config(format!("{}: {e}", path.display())))?;
    }

    let config: SourceConfig = serde_json::from_value(document)
        .map_err(|e| AppError::config(format!("Invalid config {}: {e}", path.display())))?;
    let config = config.with_default_kinds(default_kinds);
    config
        .validate()
        .map_err(|e| AppError::config(format!("{}: {e}", path.display())))?;
    log::debug!("Loaded source config from {}", path.display());
    Ok(config)
}
