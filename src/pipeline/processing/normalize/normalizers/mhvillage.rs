use super::base::{lookup, SourceNormalizer};
use crate::types::SourceKind;

/// Keyed by the dotted path inside the park detail `payload`.
const RENAMES: &[(&str, &str)] = &[
    ("name", "Community Name"),
    ("relationships.address.streetAddress1", "Street Address"),
    ("relationships.address.city", "City"),
    ("relationships.address.state", "State"),
    ("relationships.address.postalCode", "Zip Code"),
    ("relationships.address.coordinatePoint.latitude", "Latitude"),
    ("relationships.address.coordinatePoint.longitude", "Longitude"),
    ("relationships.address.county", "County"),
    ("relationships.siteCount.total", "Total Sites"),
    ("relationships.siteCount.vacant", "Vacant Sites"),
    ("relationships.homesCount.forSaleCount", "Homes For Sale"),
    ("relationships.homesCount.forRentCount", "Homes For Rent"),
    ("relationships.phone.number", "Phone Number"),
    ("relationships.favoriteCount.total", "Favorite Count"),
    ("averageMonthlyRent", "Avg Monthly Rent"),
    ("ageRestrictions", "Age Restrictions"),
    ("ageRestrictionsDescription", "Age Restrictions Description"),
    ("petsAllowed", "Pets Allowed"),
    ("isResidentOwned", "Resident Owned"),
    ("yearBuilt", "Year Built"),
    ("caption", "Caption"),
    ("description", "Description"),
    ("website", "Website"),
    ("virtualTour", "Virtual Tour"),
];

const NUMERIC: &[&str] = &[
    "Latitude",
    "Longitude",
    "Total Sites",
    "Vacant Sites",
    "Homes For Sale",
    "Homes For Rent",
    "Favorite Count",
    "Avg Monthly Rent",
    "Year Built",
];

/// MHVillage community details.
#[derive(Debug, Default)]
pub struct MhVillageNormalizer;

impl MhVillageNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl SourceNormalizer for MhVillageNormalizer {
    fn kind(&self) -> SourceKind {
        SourceKind::MhVillage
    }

    fn rename(&self, raw_path: &str) -> Option<&'static str> {
        lookup(RENAMES, raw_path)
    }

    fn is_numeric(&self, column: &str) -> bool {
        NUMERIC.contains(&column)
    }
}
