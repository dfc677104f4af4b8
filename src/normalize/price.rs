// src/normalize/price.rs

//! Price row normalization onto the fixed column schema.

use crate::models::{NormalizedPriceRow, RawRow};
use crate::normalize::generic_columns;
use crate::utils::parse_number;

/// Standard price columns, in positional order for generic sources.
pub const STANDARD_PRICE_COLUMNS: [&str; 8] = [
    "代码",
    "规格型号",
    "销售单价",
    "名称",
    "助记码",
    "补充说明",
    "别名",
    "特价",
];

/// Parse a money cell. Thousand separators are ignored and anything that is
/// not a finite number becomes 0.
pub fn parse_money(text: &str) -> f64 {
    parse_number(text).unwrap_or(0.0)
}

/// Map source rows onto [`NormalizedPriceRow`].
///
/// When every column of the first row is a `列<N>` placeholder, the standard
/// columns are assigned by position to the numerically sorted placeholders.
/// Otherwise each standard column is looked up by name.
pub fn normalize_price_rows(rows: &[RawRow]) -> Vec<NormalizedPriceRow> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let generic = generic_columns(first);

    rows.iter()
        .map(|row| {
            let cells: Vec<String> = STANDARD_PRICE_COLUMNS
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let key = match &generic {
                        Some(columns) => columns.get(idx).map(String::as_str),
                        None => Some(*name),
                    };
                    key.and_then(|k| row.get(k))
                        .map(|v| v.trim().to_string())
                        .unwrap_or_default()
                })
                .collect();

            NormalizedPriceRow {
                code: cells[0].clone(),
                spec: cells[1].clone(),
                price: parse_money(&cells[2]),
                name: cells[3].clone(),
                mnemonic: cells[4].clone(),
                note: cells[5].clone(),
                alias: cells[6].clone(),
                special_price: cells[7].clone(),
                brand: row.get("brand").map(|b| b.trim().to_string()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_named_columns() {
        let rows = vec![row(&[
            ("代码", "A1"),
            ("规格型号", "S1"),
            ("销售单价", "1,234.50"),
            ("补充说明", "note"),
            ("特价", "999"),
            ("其它", "ignored"),
        ])];
        let out = normalize_price_rows(&rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].code, "A1");
        assert_eq!(out[0].spec, "S1");
        assert_eq!(out[0].price, 1234.5);
        assert_eq!(out[0].note, "note");
        assert_eq!(out[0].special_price, "999");
        assert_eq!(out[0].name, "");
        assert_eq!(out[0].brand, None);
    }

    #[test]
    fn test_generic_columns_positional() {
        let rows = vec![row(&[
            ("列10", "special"),
            ("列1", "A1"),
            ("列2", "S1"),
            ("列3", "20"),
            ("列6", "remark"),
        ])];
        let out = normalize_price_rows(&rows);
        // 列1, 列2, 列3, 列6, 列10 fill code, spec, price, name, mnemonic
        assert_eq!(out[0].code, "A1");
        assert_eq!(out[0].spec, "S1");
        assert_eq!(out[0].price, 20.0);
        assert_eq!(out[0].name, "remark");
        assert_eq!(out[0].mnemonic, "special");
        assert_eq!(out[0].special_price, "");
    }

    #[test]
    fn test_unparsable_price_is_zero() {
        let rows = vec![
            row(&[("规格型号", "S1"), ("销售单价", "call us")]),
            row(&[("规格型号", "S2")]),
        ];
        let out = normalize_price_rows(&rows);
        assert_eq!(out[0].price, 0.0);
        assert_eq!(out[1].price, 0.0);
    }

    #[test]
    fn test_brand_carried_per_row() {
        let rows = vec![
            row(&[("规格型号", "S1"), ("brand", " ACME ")]),
            row(&[("规格型号", "S2")]),
        ];
        let out = normalize_price_rows(&rows);
        assert_eq!(out[0].brand.as_deref(), Some("ACME"));
        assert_eq!(out[1].brand, None);
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize_price_rows(&[]).is_empty());
    }
}
