//! Persisted artifacts: bundles and publish manifests.

use serde::{Deserialize, Serialize};

use crate::models::SyncMode;

/// A self-describing catalog artifact.
///
/// `payload` is base64 of either the dataset JSON (`secured: false`) or
/// `salt ‖ nonce ‖ ciphertext` (`secured: true`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub secured: bool,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub meta: BundleMeta,
}

/// Bundle metadata. None of it feeds the data hash.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "MetaRecord")]
pub struct BundleMeta {
    /// ISO 8601 generation time
    pub generated_at: String,

    #[serde(rename = "rowCount")]
    pub row_count: usize,

    pub source: String,

    /// Canonical SHA-256 of the dataset
    pub data_hash: String,

    pub source_etag: String,

    pub source_last_modified: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SyncMode>,
}

/// Meta as found on disk. Older bundles carry `version` instead of, or next
/// to, `generated_at`.
#[derive(Deserialize)]
struct MetaRecord {
    #[serde(default)]
    generated_at: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(rename = "rowCount", default)]
    row_count: usize,
    #[serde(default)]
    source: String,
    #[serde(default)]
    data_hash: String,
    #[serde(default)]
    source_etag: String,
    #[serde(default)]
    source_last_modified: String,
    #[serde(default)]
    mode: Option<SyncMode>,
}

impl From<MetaRecord> for BundleMeta {
    fn from(record: MetaRecord) -> Self {
        let generated_at = if record.generated_at.trim().is_empty() {
            record.version.unwrap_or_default()
        } else {
            record.generated_at
        };
        Self {
            generated_at,
            row_count: record.row_count,
            source: record.source,
            data_hash: record.data_hash,
            source_etag: record.source_etag,
            source_last_modified: record.source_last_modified,
            mode: record.mode,
        }
    }
}

/// Pointer from a logical "latest" name to a content-addressed bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Path of the hashed bundle relative to the manifest's directory
    pub latest: String,
    /// SHA-256 hex of the bundle bytes
    pub hash: String,
    pub updated_at: String,
}
