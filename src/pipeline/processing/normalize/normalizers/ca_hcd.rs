use super::base::{lookup, SourceNormalizer};
use crate::pipeline::processing::normalize::snake_case_key;
use crate::types::SourceKind;

/// Keyed by the snake-cased Salesforce field name (`__c` already stripped).
const RENAMES: &[(&str, &str)] = &[
    ("park_name", "Park Name"),
    ("address", "Address"),
    ("city", "City"),
    ("zip_code", "Zip Code"),
    ("county_name", "County"),
    ("park_identifier", "Park Identifier"),
    ("phone_number", "Phone Number"),
    ("total_number_lots", "Total Lots"),
    ("number_mh_lots", "MH Lots"),
    ("number_rv_lots_drains", "RV Lots (Drains)"),
    ("number_rv_lots_no_drains", "RV Lots (No Drains)"),
    ("status_id", "Status Id"),
];

const NUMERIC: &[&str] = &[
    "Total Lots",
    "MH Lots",
    "RV Lots (Drains)",
    "RV Lots (No Drains)",
    "Status Id",
];

/// CA HCD park registry rows.
#[derive(Debug, Default)]
pub struct CaHcdNormalizer;

impl CaHcdNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl SourceNormalizer for CaHcdNormalizer {
    fn kind(&self) -> SourceKind {
        SourceKind::CaHcd
    }

    fn rename(&self, raw_path: &str) -> Option<&'static str> {
        lookup(RENAMES, &snake_case_key(raw_path))
    }

    fn is_numeric(&self, column: &str) -> bool {
        NUMERIC.contains(&column)
    }
}
