//! Source kind classification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of content served by a source URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A human-facing viewer page, never data
    Html,
    Json,
    Csv,
    /// Spreadsheet workbook (xlsx or xls)
    Xlsx,
    /// A previously published bundle script
    Js,
    Unknown,
}

impl SourceKind {
    /// Kinds that a source allow-list may name.
    pub const DATA_KINDS: [SourceKind; 4] = [
        SourceKind::Csv,
        SourceKind::Json,
        SourceKind::Xlsx,
        SourceKind::Js,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Html => "html",
            SourceKind::Json => "json",
            SourceKind::Csv => "csv",
            SourceKind::Xlsx => "xlsx",
            SourceKind::Js => "js",
            SourceKind::Unknown => "unknown",
        }
    }

    /// Whether this kind carries parseable catalog data.
    pub fn is_data(&self) -> bool {
        Self::DATA_KINDS.contains(self)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "html" => Ok(SourceKind::Html),
            "json" => Ok(SourceKind::Json),
            "csv" => Ok(SourceKind::Csv),
            "xlsx" => Ok(SourceKind::Xlsx),
            "js" => Ok(SourceKind::Js),
            "unknown" => Ok(SourceKind::Unknown),
            other => Err(format!("unknown source kind: {other}")),
        }
    }
}
