// src/codec/script.rs

//! The `window.<NAME> = <json>;` bundle script grammar.
//!
//! Scripts are only ever produced by [`to_script`]; reading one back is a
//! plain parse of that single statement, nothing is evaluated.

use crate::error::{AppError, Result};
use crate::models::Bundle;

/// Render a bundle as one global assignment statement plus a newline.
pub fn to_script(var_name: &str, bundle: &Bundle) -> Result<String> {
    let json = serde_json::to_string(bundle)?;
    Ok(format!("window.{var_name} = {json};\n"))
}

/// Recover the bundle assigned to `expected_var`.
///
/// Accepts an optional `window.` prefix and an optional trailing `;`.
pub fn from_script(text: &str, expected_var: &str) -> Result<Bundle> {
    let text = text.trim_start_matches('\u{feff}').trim();
    let statement = text.strip_suffix(';').unwrap_or(text).trim_end();
    let target = statement.strip_prefix("window.").unwrap_or(statement);

    let (name, json) = target
        .split_once('=')
        .ok_or_else(|| AppError::format("bundle script has no assignment"))?;
    let name = name.trim();
    if !is_identifier(name) {
        return Err(AppError::format(format!(
            "bundle script assigns an invalid name: {name}"
        )));
    }
    if name != expected_var {
        return Err(AppError::format(format!(
            "bundle script assigns {name}, expected {expected_var}"
        )));
    }

    serde_json::from_str(json.trim())
        .map_err(|e| AppError::format(format!("bundle script is not a bundle literal: {e}")))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
