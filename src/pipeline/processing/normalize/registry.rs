use std::collections::HashMap;

use super::normalizers::{CaHcdNormalizer, MhVillageNormalizer, RivCoViewNormalizer, SourceNormalizer};
use crate::error::{Result, ScraperError};
use crate::types::{RawItem, Record, SourceKind, SourceRecord};

/// Registry for source-specific normalization strategies. Built once per run
/// and passed by reference.
pub struct NormalizationRegistry {
    normalizers: HashMap<SourceKind, Box<dyn SourceNormalizer>>,
}

impl Default for NormalizationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NormalizationRegistry {
    /// Create a registry with the built-in normalizers
    pub fn new() -> Self {
        let mut registry = Self {
            normalizers: HashMap::new(),
        };
        registry.register(Box::new(CaHcdNormalizer::new()));
        registry.register(Box::new(MhVillageNormalizer::new()));
        registry.register(Box::new(RivCoViewNormalizer::new()));
        registry
    }

    /// Register (or replace) the normalizer for its source
    pub fn register(&mut self, normalizer: Box<dyn SourceNormalizer>) {
        self.normalizers.insert(normalizer.kind(), normalizer);
    }

    pub fn get_normalizer(&self, kind: SourceKind) -> Option<&dyn SourceNormalizer> {
        self.normalizers.get(&kind).map(|n| n.as_ref())
    }

    pub fn normalize(&self, kind: SourceKind, item: &RawItem) -> Result<Record> {
        self.get_normalizer(kind)
            .map(|n| n.normalize(item))
            .ok_or_else(|| ScraperError::Config(format!("No normalizer registered for source: {kind}")))
    }

    /// Normalizes a whole run, tagging every record with the source's schema version.
    pub fn normalize_all(&self, kind: SourceKind, items: &[RawItem]) -> Result<Vec<SourceRecord>> {
        items
            .iter()
            .map(|item| self.normalize(kind, item).map(|record| SourceRecord::new(kind, record)))
            .collect()
    }
}
