// src/source/detect.rs

//! Source kind detection from URL extension and content type.

use crate::error::{AppError, Result};
use crate::models::SourceKind;
use crate::utils::url::extension;

/// Classify a source. Checks run in a fixed priority order so that a viewer
/// page is never mistaken for data.
pub fn detect_source_kind(url: &str, content_type: &str) -> SourceKind {
    let content_type = content_type.to_lowercase();
    let ext = extension(url);
    let ext = ext.as_str();

    if content_type.contains("text/html") || matches!(ext, "html" | "htm") {
        return SourceKind::Html;
    }
    if ext == "js" || content_type.contains("javascript") {
        return SourceKind::Js;
    }
    if ext == "json" || content_type.contains("json") {
        return SourceKind::Json;
    }
    if ext == "csv" || content_type.contains("csv") {
        return SourceKind::Csv;
    }
    if matches!(ext, "xlsx" | "xls")
        || content_type.contains("spreadsheet")
        || content_type.contains("excel")
    {
        return SourceKind::Xlsx;
    }
    SourceKind::Unknown
}

/// Reject html outright and any kind missing from the allow-list.
pub fn ensure_kind_allowed(kind: SourceKind, allowed: &[SourceKind], label: &str) -> Result<()> {
    if kind == SourceKind::Html {
        return Err(AppError::format(
            "Source URL points to an HTML page, not a downloadable data file",
        ));
    }
    if !allowed.contains(&kind) {
        return Err(AppError::format(format!(
            "Unsupported {label} source type: {kind}"
        )));
    }
    Ok(())
}
