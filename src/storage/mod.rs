//! Storage abstractions for published artifacts.
//!
//! ## Layout
//!
//! ```text
//! web/
//! ├── price.bundle.js            # written by `price`
//! ├── stock.bundle.js            # written by `stock`
//! ├── price-manifest.json        # written by `publish`
//! └── price/
//!     └── price.<hash12>.bundle.js
//! ```

pub mod local;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{AppError, Result};

// Re-export for convenience
pub use local::LocalStorage;

/// Byte-level artifact persistence.
///
/// Writes must be atomic: a failed write leaves the previous content intact.
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Read bytes, returning None if the key doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the content stored under `key`.
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read UTF-8 text.
    async fn read_text(&self, key: &str) -> Result<Option<String>> {
        match self.read_bytes(key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| AppError::format(format!("{key} is not UTF-8: {e}"))),
            None => Ok(None),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write pretty JSON followed by a newline.
    async fn write_json_pretty<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let mut bytes = serde_json::to_vec_pretty(value)?;
        bytes.push(b'\n');
        self.write_bytes(key, &bytes).await
    }
}
