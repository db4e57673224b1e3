use crate::pipeline::processing::normalize::{coerce_numeric, flatten, snake_case_key};
use crate::types::{Cell, RawItem, Record, SourceKind};
use tracing::debug;

/// Per-source column policy applied on top of the shared flattening rules.
pub trait SourceNormalizer: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Stable label for a raw dotted path, if the source has one.
    fn rename(&self, raw_path: &str) -> Option<&'static str>;

    /// Whether the final column should go through numeric coercion.
    fn is_numeric(&self, column: &str) -> bool;

    fn normalize(&self, item: &RawItem) -> Record {
        let mut record = Record::new();
        for field in flatten(item) {
            let column = if field.fixed {
                field.path.clone()
            } else {
                match self.rename(&field.path) {
                    Some(label) => label.to_string(),
                    None => snake_case_key(&field.path),
                }
            };
            if column.is_empty() {
                continue;
            }
            // Two raw keys can land on one column; the first non-null value wins.
            if record.get(&column).is_some_and(|existing| *existing != Cell::Null) {
                debug!(source = %self.kind(), %column, path = %field.path, "Duplicate column, keeping first value");
                continue;
            }
            let cell = if self.is_numeric(&column) {
                coerce_numeric(field.cell)
            } else {
                field.cell
            };
            record.insert(column, cell);
        }
        record
    }
}

/// Looks `key` up in a `(raw, label)` table.
pub fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(raw, _)| *raw == key).map(|(_, label)| *label)
}
