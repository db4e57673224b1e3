//! Flattening of raw portal JSON into flat `Record`s.
//!
//! Nested objects become dotted paths (`relationships.address.city`) that each
//! source's normalizer either renames to a stable label or passes through in
//! snake case. A nested `amenities` object turns into `amenity_<Name>` flags,
//! present only for truthy entries. Arrays of scalars are kept as JSON text;
//! arrays holding objects are dropped because a table cell cannot show them.

pub mod normalizers;
pub mod registry;

pub use normalizers::SourceNormalizer;
pub use registry::NormalizationRegistry;

use crate::types::{Cell, RawItem};
use serde_json::Value;

const AMENITIES_KEY: &str = "amenities";
pub const AMENITY_PREFIX: &str = "amenity_";

/// One leaf of a flattened item.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatField {
    pub path: String,
    pub cell: Cell,
    /// Already a final column name; skip renaming.
    pub fixed: bool,
}

pub fn flatten(item: &RawItem) -> Vec<FlatField> {
    let mut out = Vec::new();
    for (key, value) in item {
        flatten_value(key, value, &mut out);
    }
    out
}

fn flatten_value(path: &str, value: &Value, out: &mut Vec<FlatField>) {
    match value {
        Value::Object(map) if leaf_name(path) == AMENITIES_KEY => {
            for (name, flag) in map {
                if is_truthy(flag) {
                    out.push(FlatField {
                        path: format!("{AMENITY_PREFIX}{}", name.trim()),
                        cell: Cell::Bool(true),
                        fixed: true,
                    });
                }
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                flatten_value(&format!("{path}.{key}"), child, out);
            }
        }
        Value::Array(items) => {
            if items.iter().all(|v| !v.is_object() && !v.is_array()) {
                out.push(FlatField {
                    path: path.to_string(),
                    cell: Cell::Text(value.to_string()),
                    fixed: false,
                });
            }
        }
        scalar => {
            if let Some(cell) = Cell::from_scalar(scalar) {
                out.push(FlatField {
                    path: path.to_string(),
                    cell,
                    fixed: false,
                });
            }
        }
    }
}

fn leaf_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Truthiness the way the portals use it: `true`, non-zero numbers, and any
/// non-empty string other than an explicit "no"/"false"/"0".
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            !(s.is_empty() || s == "no" || s == "false" || s == "0" || s == "n")
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Lower-cased, underscored column name for a raw (possibly dotted) key.
/// Drops the Salesforce `__c` suffix and splits camel humps:
/// `PARK_NAME__c` -> `park_name`, `relationships.address.streetAddress1` ->
/// `relationships_address_street_address1`.
pub fn snake_case_key(raw: &str) -> String {
    raw.split('.')
        .map(snake_case_segment)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn snake_case_segment(segment: &str) -> String {
    let segment = segment.trim();
    let segment = segment.strip_suffix("__c").unwrap_or(segment);
    let mut out = String::with_capacity(segment.len() + 4);
    let mut prev: Option<char> = None;
    for ch in segment.chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase()
                && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
            {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
        prev = Some(ch);
    }
    out.trim_end_matches('_').to_string()
}

/// Best-effort numeric parse for columns expected to hold numbers. Strips `$`,
/// thousands separators and whitespace; anything still unparseable stays as it was.
pub fn coerce_numeric(cell: Cell) -> Cell {
    match cell {
        Cell::Text(text) => parse_number(&text).unwrap_or(Cell::Text(text)),
        other => other,
    }
}

fn parse_number(text: &str) -> Option<Cell> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(i) = cleaned.parse::<i64>() {
        return Some(Cell::Int(i));
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Cell::Float)
}

/// Numeric view of a raw JSON value using the same cleaning rules as `coerce_numeric`.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s).and_then(|c| c.as_f64()),
        _ => None,
    }
}
