//! Application configuration structures.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SourceKind;

/// Root system configuration shared by the price and stock runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Output locations for the static consumer
    pub app: AppPaths,

    /// Size budgets checked by `validate`
    #[serde(default)]
    pub limits: BundleLimits,
}

impl SystemConfig {
    /// Validate that every required output path is present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            &self.app.web_root,
            &self.app.price_bundle_path,
            &self.app.stock_bundle_path,
        ];
        if required.iter().any(|path| path.trim().is_empty()) {
            return Err(AppError::config("system config has missing app path fields"));
        }
        Ok(())
    }
}

/// Paths of the published artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppPaths {
    /// Directory served to the static consumer
    #[serde(default)]
    pub web_root: String,

    /// Price bundle script written by `price`
    #[serde(default)]
    pub price_bundle_path: String,

    /// Stock bundle script written by `stock`
    #[serde(default)]
    pub stock_bundle_path: String,
}

/// Maximum sizes of the generated bundle scripts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BundleLimits {
    #[serde(default = "defaults::price_bundle_max_bytes")]
    pub price_bundle_max_bytes: u64,

    #[serde(default = "defaults::stock_bundle_max_bytes")]
    pub stock_bundle_max_bytes: u64,
}

impl Default for BundleLimits {
    fn default() -> Self {
        Self {
            price_bundle_max_bytes: defaults::price_bundle_max_bytes(),
            stock_bundle_max_bytes: defaults::stock_bundle_max_bytes(),
        }
    }
}

/// Where and how to fetch one catalog source.
///
/// The URL and token accept the per-catalog spellings used by older config
/// files (`price_source_url`, `STOCK_SOURCE_TOKEN`, ...). When several are
/// present the first non-blank one wins, lower-case before upper-case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SourceRecord")]
pub struct SourceConfig {
    pub url: String,

    /// Bearer token, empty for anonymous sources
    pub token: String,

    /// Source kinds this catalog may be fed from
    pub allowed_content_types: Vec<String>,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,

    /// Maximum accepted body size
    pub max_bytes: u64,

    /// Host allow-list; empty means unrestricted
    pub allowed_domains: Vec<String>,
}

/// Source config as written on disk, with every accepted key spelling.
#[derive(Deserialize)]
struct SourceRecord {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    price_source_url: Option<String>,
    #[serde(default)]
    stock_source_url: Option<String>,
    #[serde(default, rename = "PRICE_SOURCE_URL")]
    price_source_url_upper: Option<String>,
    #[serde(default, rename = "STOCK_SOURCE_URL")]
    stock_source_url_upper: Option<String>,

    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    price_source_token: Option<String>,
    #[serde(default)]
    stock_source_token: Option<String>,
    #[serde(default, rename = "PRICE_SOURCE_TOKEN")]
    price_source_token_upper: Option<String>,
    #[serde(default, rename = "STOCK_SOURCE_TOKEN")]
    stock_source_token_upper: Option<String>,

    #[serde(default)]
    allowed_content_types: Vec<String>,
    #[serde(default = "defaults::timeout_ms")]
    timeout_ms: u64,
    #[serde(default = "defaults::max_bytes")]
    max_bytes: u64,
    #[serde(default)]
    allowed_domains: Vec<String>,
}

/// First non-blank candidate, trimmed.
fn first_present(candidates: [Option<String>; 5]) -> String {
    candidates
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

impl From<SourceRecord> for SourceConfig {
    fn from(record: SourceRecord) -> Self {
        Self {
            url: first_present([
                record.url,
                record.price_source_url,
                record.stock_source_url,
                record.price_source_url_upper,
                record.stock_source_url_upper,
            ]),
            token: first_present([
                record.token,
                record.price_source_token,
                record.stock_source_token,
                record.price_source_token_upper,
                record.stock_source_token_upper,
            ]),
            allowed_content_types: record.allowed_content_types,
            timeout_ms: record.timeout_ms,
            max_bytes: record.max_bytes,
            allowed_domains: record.allowed_domains,
        }
    }
}

impl SourceConfig {
    /// Build a config for `url` with default limits.
    pub fn new(url: impl Into<String>, allowed: &[SourceKind]) -> Self {
        Self {
            url: url.into(),
            token: String::new(),
            allowed_content_types: allowed.iter().map(|k| k.as_str().to_string()).collect(),
            timeout_ms: defaults::timeout_ms(),
            max_bytes: defaults::max_bytes(),
            allowed_domains: Vec::new(),
        }
    }

    /// Fill in the catalog's default kinds when the file listed none.
    pub fn with_default_kinds(mut self, defaults: &[SourceKind]) -> Self {
        if self.allowed_content_types.is_empty() {
            self.allowed_content_types = defaults.iter().map(|k| k.as_str().to_string()).collect();
        }
        self
    }

    /// Apply environment or CLI overrides. Blank values are ignored.
    pub fn with_overrides(mut self, url: Option<String>, token: Option<String>) -> Self {
        if let Some(url) = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
            self.url = url;
        }
        if let Some(token) = token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            self.token = token;
        }
        self
    }

    /// Parse the allow-list into source kinds.
    pub fn allowed_kinds(&self) -> Result<Vec<SourceKind>> {
        if self.allowed_content_types.is_empty() {
            return Err(AppError::config("allowed_content_types is required"));
        }
        self.allowed_content_types
            .iter()
            .map(|raw| {
                let kind = raw.trim().to_lowercase();
                match SourceKind::from_str(&kind) {
                    Ok(parsed) if parsed.is_data() => Ok(parsed),
                    _ => Err(AppError::config(format!(
                        "unsupported kind in allowed_content_types: {kind}"
                    ))),
                }
            })
            .collect()
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        self.allowed_kinds()?;
        if self.timeout_ms < 1000 {
            return Err(AppError::config("timeout_ms must be >= 1000"));
        }
        if self.max_bytes < 1024 {
            return Err(AppError::config("max_bytes must be >= 1024"));
        }
        Ok(())
    }

    /// The source URL, or a configuration error naming the env override.
    pub fn require_url(&self, label: &str) -> Result<&str> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(AppError::config(format!(
                "Missing {label} source URL ({label}_source_url or {}_SOURCE_URL)",
                label.to_uppercase()
            )));
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The bearer token, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        Some(self.token.trim()).filter(|t| !t.is_empty())
    }
}

/// Minimal schema document: keys that must appear in the source config.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceSchema {
    #[serde(default)]
    pub required: Vec<String>,
}

impl SourceSchema {
    /// Check that every required key is present in the raw config document.
    pub fn check(&self, document: &serde_json::Value) -> Result<()> {
        let object = document
            .as_object()
            .ok_or_else(|| AppError::config("source config must be an object"))?;
        for key in &self.required {
            if !object.contains_key(key) {
                return Err(AppError::config(format!(
                    "source config missing required field: {key}"
                )));
            }
        }
        Ok(())
    }
}

/// Output mode of the price bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    Encrypted,
    Plain,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Encrypted => "encrypted",
            SyncMode::Plain => "plain",
        }
    }

    pub fn is_secured(&self) -> bool {
        matches!(self, SyncMode::Encrypted)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "encrypted" => Ok(SyncMode::Encrypted),
            "plain" => Ok(SyncMode::Plain),
            _ => Err(AppError::config("mode must be encrypted or plain")),
        }
    }
}

mod defaults {
    pub fn timeout_ms() -> u64 {
        15_000
    }
    pub fn max_bytes() -> u64 {
        20 * 1024 * 1024
    }
    pub fn price_bundle_max_bytes() -> u64 {
        13 * 1024 * 1024
    }
    pub fn stock_bundle_max_bytes() -> u64 {
        900 * 1024
    }
}
