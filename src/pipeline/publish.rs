// src/pipeline/publish.rs

//! Content-addressed publishing of a finished bundle.
//!
//! ```text
//! {output_root}/
//! ├── price-manifest.json                  # {latest, hash, updated_at}
//! └── price/
//!     └── price.<first 12 hex>.bundle.js   # immutable copy
//! ```

use std::path::Path;

use serde::Serialize;

use crate::codec::timestamp_now;
use crate::error::{AppError, Result};
use crate::models::Manifest;
use crate::pipeline::hash::sha256_hex;
use crate::storage::ArtifactStorage;

/// Hex digits of the content hash used in file names.
pub const SHORT_HASH_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub changed: bool,
    pub hash: String,
    /// Hashed bundle path relative to the output root
    pub latest: String,
    pub manifest_path: String,
    pub bundle_path: String,
}

/// Logical bundle name from a file name: `price.bundle.js` -> `price`.
pub fn bundle_name(input: &Path) -> Result<String> {
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::config(format!("invalid bundle path: {}", input.display())))?;
    let name = file_name
        .strip_suffix(".bundle.js")
        .or_else(|| file_name.rsplit_once('.').map(|(stem, _)| stem))
        .unwrap_or(file_name);
    if name.is_empty() {
        return Err(AppError::config(format!("invalid bundle name: {file_name}")));
    }
    Ok(name.to_string())
}

/// Publish `input` under `storage`'s root as `<name>/<name>.<hash>.bundle.js`
/// and point `<name>-manifest.json` at it.
///
/// Nothing is written when the manifest already names this exact content.
pub async fn publish_bundle<S: ArtifactStorage>(
    input: &Path,
    storage: &S,
    name: Option<&str>,
) -> Result<PublishReport> {
    let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => bundle_name(input)?,
    };
    let content = match tokio::fs::read(input).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::config(format!(
                "Input bundle not found: {}",
                input.display()
            )));
        }
        Err(e) => return Err(AppError::Io(e)),
    };

    let hash = sha256_hex(&content);
    let latest = format!("{name}/{name}.{}.bundle.js", &hash[..SHORT_HASH_LEN]);
    let manifest_key = format!("{name}-manifest.json");

    let report = |changed: bool| PublishReport {
        changed,
        hash: hash.clone(),
        latest: latest.clone(),
        manifest_path: manifest_key.clone(),
        bundle_path: latest.clone(),
    };

    let manifest: Option<Manifest> = match storage.read_json(&manifest_key).await {
        Ok(manifest) => manifest,
        Err(e) => {
            log::warn!("Ignoring unreadable manifest {manifest_key}: {e}");
            None
        }
    };
    if let Some(manifest) = manifest.filter(|m| m.hash == hash && m.latest == latest) {
        let published = storage.read_bytes(&manifest.latest).await?;
        if published.as_deref() == Some(content.as_slice()) {
            log::info!("{name} bundle already published as {latest}");
            return Ok(report(false));
        }
    }

    storage.write_bytes(&latest, &content).await?;
    let manifest = Manifest {
        latest: latest.clone(),
        hash: hash.clone(),
        updated_at: timestamp_now(),
    };
    storage.write_json_pretty(&manifest_key, &manifest).await?;
    log::info!("Published {name} bundle {latest}");

    Ok(report(true))
}
