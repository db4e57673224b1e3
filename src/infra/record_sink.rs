use crate::error::{Result, ScraperError};
use crate::types::Record;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

/// Target file plus the format implied by its extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub path: PathBuf,
    pub format: OutputFormat,
}

impl OutputSpec {
    /// Picks the format strictly from the extension (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let format = match ext.as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            other => {
                let shown = if other.is_empty() { "(none)".to_string() } else { format!(".{other}") };
                return Err(ScraperError::UnsupportedFormat(shown));
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            format,
        })
    }
}

/// Union of column names across all records, in first-seen order.
pub fn column_union(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for record in records {
        for key in record.keys() {
            if seen.insert(key) {
                columns.push(key.to_string());
            }
        }
    }
    columns
}

pub fn write_records(records: &[Record], spec: &OutputSpec) -> Result<()> {
    if let Some(parent) = spec.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(&spec.path)?;
    match spec.format {
        OutputFormat::Json => write_json(records, file)?,
        OutputFormat::Csv => write_csv(records, file)?,
    }
    info!(path = %spec.path.display(), records = records.len(), format = ?spec.format, "Wrote output");
    Ok(())
}

/// Each object keeps its own column set; rows are not padded.
pub fn write_json<W: Write>(records: &[Record], writer: W) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_csv<W: Write>(records: &[Record], writer: W) -> Result<()> {
    let columns = column_union(records);
    let mut csv_writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    if !columns.is_empty() {
        csv_writer.write_record(&columns)?;
    }
    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|c| record.get(c).map(|cell| cell.render()).unwrap_or_default())
            .collect();
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;

    fn record(pairs: &[(&str, Cell)]) -> Record {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(OutputSpec::from_path("out/parks.json").unwrap().format, OutputFormat::Json);
        assert_eq!(OutputSpec::from_path("PARKS.CSV").unwrap().format, OutputFormat::Csv);
    }

    #[test]
    fn other_extensions_are_unsupported() {
        for path in ["parks.txt", "parks", "parks.json.gz"] {
            let err = OutputSpec::from_path(path).unwrap_err();
            assert!(matches!(err, ScraperError::UnsupportedFormat(_)), "{path}");
        }
    }

    #[test]
    fn csv_header_is_column_union() {
        let records = vec![
            record(&[("a", Cell::Int(1))]),
            record(&[("b", Cell::Int(2))]),
        ];
        let mut out = Vec::new();
        write_csv(&records, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a,b\n1,\n,2\n");
    }

    #[test]
    fn csv_quotes_embedded_commas() {
        let records = vec![record(&[
            ("Park Name", Cell::from("PACERA, PAUL")),
            ("Total Lots", Cell::Int(72)),
        ])];
        let mut out = Vec::new();
        write_csv(&records, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Park Name,Total Lots\n\"PACERA, PAUL\",72\n"
        );
    }

    #[test]
    fn json_rows_are_not_padded() {
        let records = vec![
            record(&[("a", Cell::Int(1))]),
            record(&[("b", Cell::Bool(true))]),
        ];
        let mut out = Vec::new();
        write_json(&records, &mut out).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, serde_json::json!([{"a": 1}, {"b": true}]));
    }

    #[test]
    fn empty_input_writes_empty_array_and_empty_table() {
        let mut json = Vec::new();
        write_json(&[], &mut json).unwrap();
        assert_eq!(String::from_utf8(json).unwrap().trim(), "[]");

        let mut csv = Vec::new();
        write_csv(&[], &mut csv).unwrap();
        assert!(csv.is_empty());
    }
}
