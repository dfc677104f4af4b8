// src/pipeline/validate.rs

//! Configuration and bundle size validation.

use std::path::{Path, PathBuf};

use crate::config::{
    PRICE_DEFAULT_KINDS, STOCK_DEFAULT_KINDS, load_source_config, load_system_config,
};
use crate::error::{AppError, Result};

/// Size of one published bundle against its budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeCheck {
    pub path: PathBuf,
    /// `None` when the bundle has not been written yet
    pub size: Option<u64>,
    pub limit: u64,
}

impl SizeCheck {
    pub fn is_within_limit(&self) -> bool {
        self.size.is_none_or(|size| size <= self.limit)
    }
}

/// Stat `path` and compare it with `limit`.
pub fn check_bundle_size(path: &Path, limit: u64) -> Result<SizeCheck> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => Some(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(AppError::Io(e)),
    };
    Ok(SizeCheck {
        path: path.to_path_buf(),
        size,
        limit,
    })
}

/// Paths of the optional source configs to validate.
#[derive(Debug, Clone, Default)]
pub struct ValidateTargets<'a> {
    pub price_config: Option<&'a Path>,
    pub price_schema: Option<&'a Path>,
    pub stock_config: Option<&'a Path>,
    pub stock_schema: Option<&'a Path>,
}

/// Load every config and check both bundle budgets. Missing bundles are
/// skipped; an oversized bundle fails validation.
pub fn run_validate(system_path: &Path, targets: &ValidateTargets<'_>) -> Result<Vec<SizeCheck>> {
    let system = load_system_config(system_path)?;
    log::info!("System config OK: {}", system_path.display());

    if let Some(path) = targets.price_config {
        let config = load_source_config(path, targets.price_schema, &PRICE_DEFAULT_KINDS)?;
        log::info!("Price source config OK: kinds={:?}", config.allowed_content_types);
    }
    if let Some(path) = targets.stock_config {
        let config = load_source_config(path, targets.stock_schema, &STOCK_DEFAULT_KINDS)?;
        log::info!("Stock source config OK: kinds={:?}", config.allowed_content_types);
    }

    let checks = vec![
        check_bundle_size(
            Path::new(&system.app.price_bundle_path),
            system.limits.price_bundle_max_bytes,
        )?,
        check_bundle_size(
            Path::new(&system.app.stock_bundle_path),
            system.limits.stock_bundle_max_bytes,
        )?,
    ];

    let mut oversized = Vec::new();
    for check in &checks {
        let limit_kb = check.limit as f64 / 1024.0;
        match check.size {
            None => log::warn!("[size-check] skip missing file: {}", check.path.display()),
            Some(size) if check.is_within_limit() => log::info!(
                "[size-check] OK {}: {:.1}KB <= {limit_kb:.1}KB",
                check.path.display(),
                size as f64 / 1024.0
            ),
            Some(size) => {
                log::error!(
                    "[size-check] FAIL {}: {:.1}KB > {limit_kb:.1}KB",
                    check.path.display(),
                    size as f64 / 1024.0
                );
                oversized.push(check.path.display().to_string());
            }
        }
    }

    if !oversized.is_empty() {
        return Err(AppError::config(format!(
            "bundle over size budget: {}",
            oversized.join(", ")
        )));
    }
    Ok(checks)
}
