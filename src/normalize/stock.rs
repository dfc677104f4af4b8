// src/normalize/stock.rs

//! Stock row normalization into availability fragments.

use crate::models::{RawRow, StockFragment};
use crate::normalize::generic_columns;
use crate::utils::{format_number, parse_number};

const CODE_ALIASES: [&str; 4] = ["物料长代码", "代码", "物料编码", "编码"];
const WAREHOUSE_ALIASES: [&str; 4] = ["发料仓库", "仓库", "仓位", "仓"];
const QUANTITY_ALIASES: [&str; 4] = ["库存数量", "数量", "可用数量", "库存"];
const STATUS_ALIASES: [&str; 3] = ["参考状态", "状态", "备注"];

/// Warehouse label used when a row names none.
pub const DEFAULT_WAREHOUSE: &str = "仓库";

/// Resolved column names for the four stock fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StockColumns {
    code: String,
    warehouse: String,
    quantity: String,
    status: String,
}

impl StockColumns {
    fn resolve(first: &RawRow) -> Self {
        let pick = |aliases: &[&str]| {
            aliases
                .iter()
                .find(|alias| first.contains_key(**alias))
                .map(|alias| alias.to_string())
                .unwrap_or_default()
        };
        let mut columns = Self {
            code: pick(&CODE_ALIASES),
            warehouse: pick(&WAREHOUSE_ALIASES),
            quantity: pick(&QUANTITY_ALIASES),
            status: pick(&STATUS_ALIASES),
        };

        if let Some(generic) = generic_columns(first) {
            let fallback = |slot: &mut String, idx: usize| {
                if slot.is_empty() {
                    *slot = generic.get(idx).cloned().unwrap_or_default();
                }
            };
            fallback(&mut columns.code, 0);
            fallback(&mut columns.warehouse, 1);
            fallback(&mut columns.quantity, 2);
            fallback(&mut columns.status, 3);
        }
        columns
    }
}

fn cell<'a>(row: &'a RawRow, column: &str) -> &'a str {
    if column.is_empty() {
        return "";
    }
    row.get(column).map(|v| v.trim()).unwrap_or_default()
}

/// Quantity text with separators removed; numeric values in shortest form.
fn quantity_text(raw: &str) -> String {
    let cleaned = raw.replace(',', "");
    match parse_number(&cleaned) {
        Some(number) => format_number(number),
        None => cleaned,
    }
}

/// Turn stock rows into `<warehouse>:<quantity>[(status)]` fragments.
///
/// Rows without a code are skipped, as are rows whose quantity is zero or
/// blank and whose status is empty. Input order is preserved.
pub fn normalize_stock_rows(rows: &[RawRow]) -> Vec<StockFragment> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let columns = StockColumns::resolve(first);

    rows.iter()
        .filter_map(|row| {
            let code = cell(row, &columns.code);
            if code.is_empty() {
                return None;
            }
            let warehouse = cell(row, &columns.warehouse);
            let status = cell(row, &columns.status);
            let quantity = quantity_text(cell(row, &columns.quantity));

            let has_quantity = !quantity.is_empty() && quantity != "0";
            if !has_quantity && status.is_empty() {
                return None;
            }

            let warehouse = if warehouse.is_empty() { DEFAULT_WAREHOUSE } else { warehouse };
            let quantity = if quantity.is_empty() { "0" } else { quantity.as_str() };
            let mut text = format!("{warehouse}:{quantity}");
            if !status.is_empty() {
                text.push_str(&format!("({status})"));
            }
            Some(StockFragment {
                code: code.to_string(),
                text,
            })
        })
        .collect()
}
