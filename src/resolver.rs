//! County name to CA HCD county code lookup.
//!
//! HCD numbers California's 58 counties alphabetically (Alameda = 1 ... Yuba = 58).

use crate::error::{Result, ScraperError};
use std::collections::HashMap;
use tracing::debug;

const CALIFORNIA_COUNTIES: [&str; 58] = [
    "Alameda",
    "Alpine",
    "Amador",
    "Butte",
    "Calaveras",
    "Colusa",
    "Contra Costa",
    "Del Norte",
    "El Dorado",
    "Fresno",
    "Glenn",
    "Humboldt",
    "Imperial",
    "Inyo",
    "Kern",
    "Kings",
    "Lake",
    "Lassen",
    "Los Angeles",
    "Madera",
    "Marin",
    "Mariposa",
    "Mendocino",
    "Merced",
    "Modoc",
    "Mono",
    "Monterey",
    "Napa",
    "Nevada",
    "Orange",
    "Placer",
    "Plumas",
    "Riverside",
    "Sacramento",
    "San Benito",
    "San Bernardino",
    "San Diego",
    "San Francisco",
    "San Joaquin",
    "San Luis Obispo",
    "San Mateo",
    "Santa Barbara",
    "Santa Clara",
    "Santa Cruz",
    "Shasta",
    "Sierra",
    "Siskiyou",
    "Solano",
    "Sonoma",
    "Stanislaus",
    "Sutter",
    "Tehama",
    "Trinity",
    "Tulare",
    "Tuolumne",
    "Ventura",
    "Yolo",
    "Yuba",
];

/// Read-only county table, built once at startup and lent to the registry adapter.
#[derive(Debug, Clone)]
pub struct CountyResolver {
    codes: HashMap<String, u32>,
}

fn lookup_key(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let stripped = lowered.strip_suffix(" county").unwrap_or(&lowered);
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Default for CountyResolver {
    fn default() -> Self {
        let codes = CALIFORNIA_COUNTIES
            .iter()
            .enumerate()
            .map(|(i, name)| (lookup_key(name), i as u32 + 1))
            .collect();
        Self { codes }
    }
}

impl CountyResolver {
    /// Built-in table with configured entries layered on top.
    pub fn with_overrides<'a>(extra: impl IntoIterator<Item = (&'a String, &'a u32)>) -> Self {
        let mut resolver = Self::default();
        for (name, code) in extra {
            resolver.codes.insert(lookup_key(name), *code);
        }
        resolver
    }

    /// An explicit code always wins over the name lookup.
    pub fn resolve(&self, county: &str, override_code: Option<u32>) -> Result<u32> {
        if let Some(code) = override_code {
            debug!(county, code, "Using explicit county code");
            return Ok(code);
        }
        self.codes
            .get(&lookup_key(county))
            .copied()
            .ok_or_else(|| ScraperError::UnknownCounty(county.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_county_resolves_to_its_alphabetical_code() {
        let resolver = CountyResolver::default();
        for (i, name) in CALIFORNIA_COUNTIES.iter().enumerate() {
            assert_eq!(resolver.resolve(name, None).unwrap(), i as u32 + 1, "{name}");
        }
    }

    #[test]
    fn lookup_ignores_case_whitespace_and_county_suffix() {
        let resolver = CountyResolver::default();
        assert_eq!(resolver.resolve("  riverside ", None).unwrap(), 33);
        assert_eq!(resolver.resolve("RIVERSIDE COUNTY", None).unwrap(), 33);
        assert_eq!(resolver.resolve("san   bernardino", None).unwrap(), 36);
    }

    #[test]
    fn unknown_county_fails_without_override() {
        let resolver = CountyResolver::default();
        let err = resolver.resolve("Maricopa", None).unwrap_err();
        assert!(matches!(err, ScraperError::UnknownCounty(name) if name == "Maricopa"));
    }

    #[test]
    fn override_always_wins() {
        let resolver = CountyResolver::default();
        assert_eq!(resolver.resolve("Maricopa", Some(7)).unwrap(), 7);
        assert_eq!(resolver.resolve("Riverside", Some(99)).unwrap(), 99);
    }

    #[test]
    fn configured_entries_extend_the_table() {
        let mut extra = std::collections::BTreeMap::new();
        extra.insert("Test Valley".to_string(), 77u32);
        let resolver = CountyResolver::with_overrides(&extra);
        assert_eq!(resolver.resolve("test valley", None).unwrap(), 77);
        assert_eq!(resolver.resolve("Riverside", None).unwrap(), 33);
    }
}
