// src/utils/url.rs

//! URL inspection utilities.

use crate::error::{AppError, Result};

/// Lower-cased extension of the URL path, ignoring the query string.
///
/// # Examples
/// ```
/// use catalog_sync::utils::url::extension;
///
/// assert_eq!(extension("https://x/price.XLSX?dl=1"), "xlsx");
/// assert_eq!(extension("https://x/view"), "");
/// ```
pub fn extension(url: &str) -> String {
    let clean = url.split('?').next().unwrap_or_default().to_lowercase();
    let path = match clean.find("://") {
        Some(idx) => match clean[idx + 3..].find('/') {
            Some(slash) => clean[idx + 3 + slash..].to_string(),
            None => String::new(),
        },
        None => clean,
    };
    match path.rfind('.') {
        Some(idx) if !path[idx + 1..].contains('/') => path[idx + 1..].to_string(),
        _ => String::new(),
    }
}

/// Extract the lower-cased host from a URL.
pub fn get_host(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed.host_str().map(|h| h.to_lowercase())
}

/// Whether `url`'s host equals or is a sub-domain of an allow-listed domain.
/// An empty allow-list permits every host.
pub fn is_host_allowed(url: &str, allowed_domains: &[String]) -> bool {
    let domains: Vec<String> = allowed_domains
        .iter()
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect();
    if domains.is_empty() {
        return true;
    }

    let Some(host) = get_host(url) else {
        return false;
    };
    domains
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

/// Fail with a domain error when the URL's host is not allow-listed.
pub fn ensure_host_allowed(url: &str, allowed_domains: &[String]) -> Result<()> {
    if is_host_allowed(url, allowed_domains) {
        return Ok(());
    }
    Err(AppError::domain(
        get_host(url).unwrap_or_else(|| url.to_string()),
    ))
}
