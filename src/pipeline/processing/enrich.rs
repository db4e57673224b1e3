use chrono::{DateTime, NaiveDate, NaiveDateTime};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Result, ScraperError};
use crate::pipeline::processing::normalize::{is_truthy, numeric_value, AMENITY_PREFIX};
use crate::types::{Cell, RawItem, Record, SourceKind};

/// Detail categories on an MHVillage park that describe amenities.
const AMENITY_CATEGORIES: &[&str] = &["amenity", "infrastructure", "location"];

/// Auxiliary lookups for one record, taken from the raw item it was normalized from.
/// The normalizer drops these nested lists, so enrichment reads them from here.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentContext {
    pub kind: Option<SourceKind>,
    pub sales: Option<Value>,
    pub history: Option<Value>,
    pub details: Option<Value>,
    pub photos: Option<Value>,
}

impl EnrichmentContext {
    pub fn from_raw(item: &RawItem, kind: SourceKind) -> Self {
        let relationships = item.get("relationships").and_then(Value::as_object);
        let nested = |key: &str| {
            relationships
                .and_then(|r| r.get(key))
                .or_else(|| item.get(key))
                .cloned()
        };
        Self {
            kind: Some(kind),
            sales: field(item, &["sales", "Sales"]).cloned(),
            history: field(item, &["history", "History"]).cloned(),
            details: nested("details"),
            photos: nested("photos").or_else(|| item.get("photoCount").cloned()),
        }
    }
}

/// Adds derived columns to a normalized record. Never removes a column.
pub trait Enricher: Send + Sync {
    fn enrich(&self, record: &mut Record, context: &EnrichmentContext);
}

/// Assessor sales/assessment summaries and directory amenity flags.
#[derive(Debug, Default)]
pub struct DefaultEnricher;

impl DefaultEnricher {
    pub fn new() -> Self {
        Self
    }
}

impl Enricher for DefaultEnricher {
    fn enrich(&self, record: &mut Record, context: &EnrichmentContext) {
        let steps: Vec<Result<Vec<(String, Cell)>>> = match context.kind {
            Some(SourceKind::RivCoView) => vec![
                sales_summary(context.sales.as_ref()),
                assessment_summary(context.history.as_ref()),
            ],
            Some(SourceKind::MhVillage) => vec![
                amenity_flags(context.details.as_ref()),
                Ok(vec![("withPhotos".to_string(), Cell::Bool(has_photos(context.photos.as_ref())))]),
            ],
            Some(SourceKind::CaHcd) | None => Vec::new(),
        };

        for step in steps {
            match step {
                Ok(columns) => {
                    for (name, cell) in columns {
                        record.insert(name, cell);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Enrichment skipped for record");
                    counter!("park_scraper_enrichment_errors_total").increment(1);
                }
            }
        }
    }
}

fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|n| object.get(*n))
        .find(|v| !v.is_null())
}

fn object_list<'a>(value: Option<&'a Value>, name: &str) -> Result<Vec<&'a Map<String, Value>>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.iter().filter_map(Value::as_object).collect()),
        Some(other) => Err(ScraperError::Enrichment {
            field: name.to_string(),
            message: format!("expected a list, got {other}"),
        }),
    }
}

/// Accepts the date shapes the assessor has been seen to return.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    // `%.f` also matches a missing fraction.
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S%.f",
        "%m/%d/%Y %I:%M:%S %p",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    ["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn sale_date(sale: &Map<String, Value>) -> Option<NaiveDate> {
    field(sale, &["saledate", "saleDate", "SaleDate"])
        .and_then(Value::as_str)
        .and_then(parse_date)
}

/// `salesCount`, plus `lastSaleDate`/`lastSalePrice`/`lastSaleQualified` for the
/// most recent sale. Undated sales rank below dated ones; ties keep the earliest entry.
fn sales_summary(sales: Option<&Value>) -> Result<Vec<(String, Cell)>> {
    let sales = object_list(sales, "sales")?;
    let mut columns = vec![("salesCount".to_string(), Cell::Int(sales.len() as i64))];

    let mut latest: Option<(&Map<String, Value>, Option<NaiveDate>)> = None;
    for &sale in &sales {
        let date = sale_date(sale);
        if latest.map_or(true, |(_, best)| date > best) {
            latest = Some((sale, date));
        }
    }
    if let Some((sale, date)) = latest {
        let date_cell = match date {
            Some(d) => Cell::Date(d),
            None => field(sale, &["saledate", "saleDate", "SaleDate"])
                .and_then(Cell::from_scalar)
                .unwrap_or(Cell::Null),
        };
        let price = field(sale, &["SalePrice", "salePrice", "saleprice"]).and_then(numeric_value);
        columns.push(("lastSaleDate".to_string(), date_cell));
        columns.push(("lastSalePrice".to_string(), Cell::from(price)));
        if let Some(qualified) = field(sale, &["Qualified", "qualified"]).and_then(Cell::from_scalar) {
            columns.push(("lastSaleQualified".to_string(), qualified));
        }
    }
    Ok(columns)
}

fn tax_year(entry: &Map<String, Value>) -> Option<i64> {
    match field(entry, &["TaxYear", "taxYear", "taxyear"])? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Assessed value at the latest tax year and at the year before it, with the
/// year-over-year change. The change is null when the prior value is missing or zero.
fn assessment_summary(history: Option<&Value>) -> Result<Vec<(String, Cell)>> {
    let entries = object_list(history, "history")?;
    let by_year: Vec<(i64, Option<f64>)> = entries
        .iter()
        .filter_map(|entry| {
            let year = tax_year(entry)?;
            let value = field(entry, &["AssessedTot", "assessedTot"]).and_then(numeric_value);
            Some((year, value))
        })
        .collect();
    let Some(latest_year) = by_year.iter().map(|(year, _)| *year).max() else {
        return Ok(Vec::new());
    };
    let value_at = |year: i64| {
        by_year
            .iter()
            .filter(|(y, _)| *y == year)
            .find_map(|(_, v)| *v)
    };
    let latest = value_at(latest_year);
    let prev = value_at(latest_year - 1);
    let (delta, percent) = yoy_change(latest, prev);

    Ok(vec![
        ("assessedYearLatest".to_string(), Cell::Int(latest_year)),
        ("assessedLatest".to_string(), Cell::from(latest)),
        ("assessedPrev".to_string(), Cell::from(prev)),
        ("yoyDelta".to_string(), Cell::from(delta)),
        ("yoyPercent".to_string(), Cell::from(percent)),
    ])
}

/// `(latest - prev, (latest - prev) / prev * 100)`, or nulls when `prev` is absent or zero.
pub fn yoy_change(latest: Option<f64>, prev: Option<f64>) -> (Option<f64>, Option<f64>) {
    match (latest, prev) {
        (Some(latest), Some(prev)) if prev != 0.0 => {
            let delta = latest - prev;
            (Some(delta), Some(delta / prev * 100.0))
        }
        _ => (None, None),
    }
}

static CAMEL_HUMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("static regex"));

/// `golfCourse` / `golf_course` -> `Golf Course`.
pub fn readable_name(raw: &str) -> String {
    let spaced = raw.replace(|c: char| c == '_' || c == '-', " ");
    CAMEL_HUMP
        .replace_all(&spaced, "$1 $2")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn amenity_flags(details: Option<&Value>) -> Result<Vec<(String, Cell)>> {
    let details = object_list(details, "details")?;
    let mut columns = Vec::new();
    for detail in details {
        let category = detail.get("category").and_then(Value::as_str).unwrap_or_default();
        if !AMENITY_CATEGORIES.contains(&category) {
            continue;
        }
        let kind = match detail.get("type") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        if kind.is_empty() || !detail.get("value").is_some_and(is_truthy) {
            continue;
        }
        columns.push((format!("{AMENITY_PREFIX}{}", readable_name(&kind)), Cell::Bool(true)));
    }
    Ok(columns)
}

fn has_photos(photos: Option<&Value>) -> bool {
    match photos {
        Some(Value::Object(map)) => map
            .get("data")
            .map(is_truthy)
            .unwrap_or_else(|| !map.is_empty()),
        Some(other) => is_truthy(other),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawItem {
        value.as_object().cloned().unwrap()
    }

    fn enriched(kind: SourceKind, item: Value) -> Record {
        let item = raw(item);
        let mut record = Record::new();
        DefaultEnricher::new().enrich(&mut record, &EnrichmentContext::from_raw(&item, kind));
        record
    }

    #[test]
    fn yoy_law() {
        assert_eq!(yoy_change(Some(120_000.0), Some(100_000.0)), (Some(20_000.0), Some(20.0)));
        assert_eq!(yoy_change(Some(120_000.0), Some(0.0)), (None, None));
        assert_eq!(yoy_change(Some(120_000.0), None), (None, None));
    }

    #[test]
    fn assessment_uses_latest_and_previous_year() {
        let record = enriched(
            SourceKind::RivCoView,
            json!({ "history": [
                { "TaxYear": "2022", "AssessedTot": "$95,000" },
                { "TaxYear": 2024, "AssessedTot": 120000 },
                { "taxYear": 2023, "assessedTot": 100000 }
            ]}),
        );
        assert_eq!(record.get("assessedYearLatest"), Some(&Cell::Int(2024)));
        assert_eq!(record.get("assessedLatest"), Some(&Cell::Float(120_000.0)));
        assert_eq!(record.get("assessedPrev"), Some(&Cell::Float(100_000.0)));
        assert_eq!(record.get("yoyDelta"), Some(&Cell::Float(20_000.0)));
        assert_eq!(record.get("yoyPercent"), Some(&Cell::Float(20.0)));
    }

    #[test]
    fn gap_year_leaves_previous_and_change_null() {
        let record = enriched(
            SourceKind::RivCoView,
            json!({ "history": [
                { "TaxYear": 2021, "AssessedTot": 90000 },
                { "TaxYear": 2024, "AssessedTot": 120000 }
            ]}),
        );
        assert_eq!(record.get("assessedPrev"), Some(&Cell::Null));
        assert_eq!(record.get("yoyDelta"), Some(&Cell::Null));
        assert_eq!(record.get("yoyPercent"), Some(&Cell::Null));
    }

    #[test]
    fn zero_previous_value_gives_null_change() {
        let record = enriched(
            SourceKind::RivCoView,
            json!({ "history": [
                { "TaxYear": 2023, "AssessedTot": 0 },
                { "TaxYear": 2024, "AssessedTot": 50000 }
            ]}),
        );
        assert_eq!(record.get("assessedPrev"), Some(&Cell::Float(0.0)));
        assert_eq!(record.get("yoyPercent"), Some(&Cell::Null));
    }

    #[test]
    fn sales_summary_picks_most_recent_sale() {
        let record = enriched(
            SourceKind::RivCoView,
            json!({ "sales": [
                { "saledate": "03/15/2012", "SalePrice": "$150,000", "Qualified": "Y" },
                { "saledate": "2019-07-01", "SalePrice": 310000, "Qualified": "N" },
                { "SalePrice": 1 }
            ]}),
        );
        assert_eq!(record.get("salesCount"), Some(&Cell::Int(3)));
        assert_eq!(
            record.get("lastSaleDate"),
            Some(&Cell::Date(NaiveDate::from_ymd_opt(2019, 7, 1).unwrap()))
        );
        assert_eq!(record.get("lastSalePrice"), Some(&Cell::Float(310_000.0)));
        assert_eq!(record.get("lastSaleQualified"), Some(&Cell::from("N")));
    }

    #[test]
    fn sale_timestamps_with_fractional_seconds_are_ordered() {
        let record = enriched(
            SourceKind::RivCoView,
            json!({ "sales": [
                { "saledate": "2012-03-15 00:00:00.000", "SalePrice": 150000 },
                { "saledate": "2019-07-01 00:00:00.000", "SalePrice": 310000 }
            ]}),
        );
        assert_eq!(
            record.get("lastSaleDate"),
            Some(&Cell::Date(NaiveDate::from_ymd_opt(2019, 7, 1).unwrap()))
        );
        assert_eq!(record.get("lastSalePrice"), Some(&Cell::Float(310_000.0)));
    }

    #[test]
    fn date_shapes() {
        let day = NaiveDate::from_ymd_opt(2019, 7, 1);
        assert_eq!(parse_date("2019-07-01T00:00:00.123"), day);
        assert_eq!(parse_date("2019-07-01 00:00:00"), day);
        assert_eq!(parse_date("7/1/2019 12:00:00 AM"), day);
        assert_eq!(parse_date("07/01/2019"), day);
        assert_eq!(parse_date("2019-07-01T08:00:00Z"), day);
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn missing_sales_count_as_zero() {
        let record = enriched(SourceKind::RivCoView, json!({ "apn": "1" }));
        assert_eq!(record.get("salesCount"), Some(&Cell::Int(0)));
        assert!(!record.contains("lastSaleDate"));
        assert!(!record.contains("assessedLatest"));
    }

    #[test]
    fn malformed_history_degrades_without_touching_other_fields() {
        let item = raw(json!({ "history": "not a list", "sales": [] }));
        let mut record: Record = [("APN", Cell::from("1"))].into_iter().collect();
        DefaultEnricher::new().enrich(&mut record, &EnrichmentContext::from_raw(&item, SourceKind::RivCoView));
        assert_eq!(record.get("APN"), Some(&Cell::from("1")));
        assert_eq!(record.get("salesCount"), Some(&Cell::Int(0)));
        assert!(!record.contains("assessedLatest"));
    }

    #[test]
    fn directory_amenities_and_photos() {
        let record = enriched(
            SourceKind::MhVillage,
            json!({ "relationships": {
                "details": [
                    { "category": "amenity", "type": "golfCourse", "value": true },
                    { "category": "amenity", "type": "swimming_pool", "value": false },
                    { "category": "infrastructure", "type": "gated", "value": "Yes" },
                    { "category": "pricing", "type": "lotRent", "value": 900 }
                ],
                "photos": [{ "url": "a.jpg" }]
            }}),
        );
        assert_eq!(record.get("amenity_Golf Course"), Some(&Cell::Bool(true)));
        assert_eq!(record.get("amenity_Gated"), Some(&Cell::Bool(true)));
        assert!(!record.contains("amenity_Swimming Pool"));
        assert!(!record.contains("amenity_Lot Rent"));
        assert_eq!(record.get("withPhotos"), Some(&Cell::Bool(true)));
    }

    #[test]
    fn no_photos_is_false() {
        let record = enriched(SourceKind::MhVillage, json!({ "relationships": { "photos": [] } }));
        assert_eq!(record.get("withPhotos"), Some(&Cell::Bool(false)));
    }

    #[test]
    fn registry_records_are_untouched() {
        let record = enriched(SourceKind::CaHcd, json!({ "PARK_NAME__c": "X" }));
        assert!(record.is_empty());
    }

    #[test]
    fn readable_names() {
        assert_eq!(readable_name("golfCourse"), "Golf Course");
        assert_eq!(readable_name("shuffleboard_court"), "Shuffleboard Court");
        assert_eq!(readable_name("RV Storage"), "Rv Storage");
    }
}
