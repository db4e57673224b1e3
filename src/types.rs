use crate::constants::{CA_HCD_SOURCE, MHVILLAGE_SOURCE, RIVCOVIEW_SOURCE};
use crate::error::ScraperError;
use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Raw nested JSON object for one park, parcel or community, exactly as the portal sent it.
pub type RawItem = Map<String, Value>;

/// The three portals this crate knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// State park registry (CA HCD mobile home park search).
    CaHcd,
    /// Commercial listing directory (MHVillage).
    MhVillage,
    /// County assessor portal (RivCoView).
    RivCoView,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::CaHcd => CA_HCD_SOURCE,
            SourceKind::MhVillage => MHVILLAGE_SOURCE,
            SourceKind::RivCoView => RIVCOVIEW_SOURCE,
        }
    }

    /// Bumped whenever the column set a source's normalizer emits changes meaning.
    pub fn schema_version(&self) -> u32 {
        match self {
            SourceKind::CaHcd => 1,
            SourceKind::MhVillage => 1,
            SourceKind::RivCoView => 1,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            CA_HCD_SOURCE => Ok(SourceKind::CaHcd),
            MHVILLAGE_SOURCE => Ok(SourceKind::MhVillage),
            RIVCOVIEW_SOURCE => Ok(SourceKind::RivCoView),
            other => Err(ScraperError::Config(format!("unknown source '{other}'"))),
        }
    }
}

/// One table cell. Numeric coercion that fails leaves the original text in place.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl Cell {
    /// Converts a scalar JSON value. Arrays and objects are not cells.
    pub fn from_scalar(value: &Value) -> Option<Cell> {
        match value {
            Value::Null => Some(Cell::Null),
            Value::Bool(b) => Some(Cell::Bool(*b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            }),
            Value::String(s) => Some(Cell::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text form used by the CSV sink. Null renders as an empty field.
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Bool(b) => b.to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) if f.is_finite() => f.to_string(),
            Cell::Float(_) => String::new(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

impl From<f64> for Cell {
    fn from(f: f64) -> Self {
        Cell::Float(f)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Null)
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_none(),
            Cell::Bool(b) => serializer.serialize_bool(*b),
            Cell::Int(i) => serializer.serialize_i64(*i),
            Cell::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Cell::Float(_) => serializer.serialize_none(),
            Cell::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Flat, insertion-ordered mapping from column name to cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, Cell)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column, keeping its original position if it already exists.
    pub fn insert(&mut self, key: impl Into<String>, cell: impl Into<Cell>) {
        let key = key.into();
        let cell = cell.into();
        match self.columns.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = cell,
            None => self.columns.push((key, cell)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Cell> {
        self.columns.iter().find(|(k, _)| k == key).map(|(_, c)| c)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.columns.iter().map(|(k, c)| (k.as_str(), c))
    }
}

impl<K: Into<String>, C: Into<Cell>> FromIterator<(K, C)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, C)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, c) in iter {
            record.insert(k, c);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (k, c) in &self.columns {
            map.serialize_entry(k, c)?;
        }
        map.end()
    }
}

/// A normalized record tagged with the adapter and schema version that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub source: SourceKind,
    pub schema_version: u32,
    pub record: Record,
}

impl SourceRecord {
    pub fn new(source: SourceKind, record: Record) -> Self {
        Self {
            source,
            schema_version: source.schema_version(),
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_keeps_first_position() {
        let mut record = Record::new();
        record.insert("a", 1i64);
        record.insert("b", "x");
        record.insert("a", 2i64);
        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&Cell::Int(2)));
    }

    #[test]
    fn record_serializes_in_column_order() {
        let record: Record = vec![("z", Cell::Int(1)), ("a", Cell::Null)].into_iter().collect();
        let text = serde_json::to_string(&record).unwrap();
        assert_eq!(text, r#"{"z":1,"a":null}"#);
    }

    #[test]
    fn scalar_conversion_rejects_composites() {
        assert_eq!(Cell::from_scalar(&json!(3)), Some(Cell::Int(3)));
        assert_eq!(Cell::from_scalar(&json!(2.5)), Some(Cell::Float(2.5)));
        assert_eq!(Cell::from_scalar(&json!([1])), None);
        assert_eq!(Cell::from_scalar(&json!({"a": 1})), None);
    }

    #[test]
    fn source_names_round_trip() {
        for name in crate::constants::get_supported_sources() {
            let kind: SourceKind = name.parse().unwrap();
            assert_eq!(kind.as_str(), name);
        }
        assert!("zillow".parse::<SourceKind>().is_err());
    }
}
