//! Warehouse dimension lookups.
//!
//! A [`DimensionMap`] is a read-only snapshot of the natural key to surrogate
//! id tables for one run. It holds no interior mutability, so it can be shared
//! across domain workers without locking.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lookup::CaseInsensitiveMap;

/// Warehouse surrogate identifier.
pub type SurrogateId = i64;

/// Sentinel id given to natural keys that are not in the lookup.
pub const UNRESOLVED_ID: SurrogateId = 0;

/// Dimension tables the resolver knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    Item,
    Form,
    Subject,
    Site,
    Visit,
}

impl DimensionKind {
    pub const ALL: [Self; 5] = [
        Self::Item,
        Self::Form,
        Self::Subject,
        Self::Site,
        Self::Visit,
    ];

    /// Warehouse map table backing this dimension.
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Item => "map_item",
            Self::Form => "map_form",
            Self::Subject => "map_subject",
            Self::Site => "map_site",
            Self::Visit => "map_visit",
        }
    }

    /// `(natural key column, surrogate id column)` in the map table.
    pub fn key_columns(self) -> (&'static str, &'static str) {
        match self {
            Self::Item => ("item_nm", "item_id"),
            Self::Form => ("form_nm", "form_id"),
            Self::Subject => ("subjid", "subject_id"),
            Self::Site => ("sitemnemonic", "site_id"),
            Self::Visit => ("visit_nm", "visit_id"),
        }
    }

    /// Form names are matched regardless of case; all other keys are exact.
    pub fn is_case_insensitive(self) -> bool {
        matches!(self, Self::Form)
    }
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Item => "item",
            Self::Form => "form",
            Self::Subject => "subject",
            Self::Site => "site",
            Self::Visit => "visit",
        };
        f.write_str(name)
    }
}

/// Source of dimension lookup tables.
pub trait DimensionProvider {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Return the full natural key to surrogate id mapping for one dimension.
    fn lookup(&self, kind: DimensionKind) -> Result<HashMap<String, SurrogateId>, Self::Error>;
}

#[derive(Debug, Clone)]
enum DimensionTable {
    Exact(HashMap<String, SurrogateId>),
    CaseInsensitive(CaseInsensitiveMap<SurrogateId>),
}

impl DimensionTable {
    fn new(kind: DimensionKind, entries: HashMap<String, SurrogateId>) -> Self {
        if kind.is_case_insensitive() {
            Self::CaseInsensitive(CaseInsensitiveMap::new(entries))
        } else {
            Self::Exact(entries)
        }
    }

    fn get(&self, key: &str) -> Option<SurrogateId> {
        match self {
            Self::Exact(map) => map.get(key).copied(),
            Self::CaseInsensitive(map) => map.get(key).copied(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Exact(map) => map.len(),
            Self::CaseInsensitive(map) => map.len(),
        }
    }
}

/// Snapshot of every dimension lookup used during a run.
#[derive(Debug, Clone, Default)]
pub struct DimensionMap {
    tables: HashMap<DimensionKind, DimensionTable>,
}

impl DimensionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the requested dimensions from a provider.
    pub fn load<P: DimensionProvider>(
        provider: &P,
        kinds: impl IntoIterator<Item = DimensionKind>,
    ) -> Result<Self, P::Error> {
        let mut map = Self::new();
        for kind in kinds {
            let entries = provider.lookup(kind)?;
            tracing::debug!(dimension = %kind, entries = entries.len(), "loaded dimension");
            map.insert(kind, entries);
        }
        Ok(map)
    }

    /// Replace the lookup for one dimension.
    pub fn insert(&mut self, kind: DimensionKind, entries: HashMap<String, SurrogateId>) {
        self.tables.insert(kind, DimensionTable::new(kind, entries));
    }

    /// Builder-style variant of [`DimensionMap::insert`].
    #[must_use]
    pub fn with<I, K>(mut self, kind: DimensionKind, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, SurrogateId)>,
        K: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(key, id)| (key.into(), id))
            .collect();
        self.insert(kind, entries);
        self
    }

    /// Resolve a natural key, `None` when the key (or the whole table) is absent.
    pub fn resolve(&self, kind: DimensionKind, key: &str) -> Option<SurrogateId> {
        self.tables.get(&kind)?.get(key)
    }

    /// Resolve a natural key, falling back to [`UNRESOLVED_ID`].
    pub fn resolve_or_sentinel(&self, kind: DimensionKind, key: &str) -> SurrogateId {
        self.resolve(kind, key).unwrap_or(UNRESOLVED_ID)
    }

    pub fn contains(&self, kind: DimensionKind) -> bool {
        self.tables.contains_key(&kind)
    }

    /// Number of entries loaded for a dimension.
    pub fn len(&self, kind: DimensionKind) -> usize {
        self.tables.get(&kind).map_or(0, DimensionTable::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DimensionMap {
        DimensionMap::new()
            .with(DimensionKind::Item, [("AETERM", 11), ("AESEV", 12)])
            .with(DimensionKind::Form, [("Adverse Events", 3)])
    }

    #[test]
    fn test_item_lookup_is_exact() {
        let map = sample();
        assert_eq!(map.resolve(DimensionKind::Item, "AETERM"), Some(11));
        assert_eq!(map.resolve(DimensionKind::Item, "aeterm"), None);
    }

    #[test]
    fn test_form_lookup_ignores_case() {
        let map = sample();
        assert_eq!(map.resolve(DimensionKind::Form, "ADVERSE EVENTS"), Some(3));
        assert_eq!(map.resolve(DimensionKind::Form, "adverse events"), Some(3));
    }

    #[test]
    fn test_unresolved_key_gets_sentinel() {
        let map = sample();
        assert_eq!(map.resolve_or_sentinel(DimensionKind::Item, "MISSING"), 0);
        assert_eq!(map.resolve_or_sentinel(DimensionKind::Visit, "SCREENING"), 0);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let map = sample();
        let first = map.resolve_or_sentinel(DimensionKind::Item, "AESEV");
        let second = map.resolve_or_sentinel(DimensionKind::Item, "AESEV");
        assert_eq!(first, second);
    }

    #[test]
    fn test_dimension_kind_deserializes_lowercase() {
        let kind: DimensionKind = serde_json::from_str("\"visit\"").expect("kind");
        assert_eq!(kind, DimensionKind::Visit);
        assert_eq!(kind.table_name(), "map_visit");
    }
}
