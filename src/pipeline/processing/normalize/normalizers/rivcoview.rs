use super::base::{lookup, SourceNormalizer};
use crate::pipeline::processing::normalize::snake_case_key;
use crate::types::SourceKind;

const RENAMES: &[(&str, &str)] = &[
    ("apn", "APN"),
    ("pin", "PIN"),
    ("street_address", "Street Address"),
    ("situs_city", "Situs City"),
    ("city", "City"),
    ("zip", "Zip Code"),
    ("class_code", "Class Code"),
    ("acreage", "Acreage"),
    ("lat", "Latitude"),
    ("lng", "Longitude"),
    ("tax_total", "Tax Total"),
];

const NUMERIC: &[&str] = &["Acreage", "Latitude", "Longitude", "Tax Total"];

/// RivCoView parcels (search row merged with the parcel detail).
#[derive(Debug, Default)]
pub struct RivCoViewNormalizer;

impl RivCoViewNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl SourceNormalizer for RivCoViewNormalizer {
    fn kind(&self) -> SourceKind {
        SourceKind::RivCoView
    }

    fn rename(&self, raw_path: &str) -> Option<&'static str> {
        lookup(RENAMES, &snake_case_key(raw_path))
    }

    fn is_numeric(&self, column: &str) -> bool {
        NUMERIC.contains(&column)
    }
}
