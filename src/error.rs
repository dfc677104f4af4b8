// src/error.rs

//! Unified error handling for catalog synchronization.
//!
//! Every variant aborts the current run. Nothing is retried internally and
//! the previously written bundle is never touched once an error is raised.

use std::fmt;

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level HTTP failure (connection refused, TLS, body decode)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request or body read exceeded the configured timeout
    #[error("Source request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Source answered with a non-success status
    #[error("Source request failed: HTTP {status}")]
    Http { status: u16 },

    /// Declared or actual body size is over budget
    #[error("Response too large: {size} bytes (limit {limit})")]
    SizeLimit { size: u64, limit: u64 },

    /// Source host is not in the allow-list
    #[error("Source URL host is not in allowed_domains: {0}")]
    Domain(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source content is not usable data
    #[error("Format error: {0}")]
    Format(String),

    /// Missing password, bad key material or failed authentication
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a format error.
    pub fn format(message: impl fmt::Display) -> Self {
        Self::Format(message.to_string())
    }

    /// Create a crypto error.
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto(message.into())
    }

    /// Create a domain allow-list error.
    pub fn domain(host: impl Into<String>) -> Self {
        Self::Domain(host.into())
    }

    /// Create a size limit error.
    pub fn size_limit(size: u64, limit: u64) -> Self {
        Self::SizeLimit { size, limit }
    }

    /// Whether this error is the dedicated timeout class.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
