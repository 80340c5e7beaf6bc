//! Catalog records and the per-site document they are merged into.
//!
//! Upstream JSON is parsed best-effort: only the identity fields are typed,
//! everything else Shopify sends (variants, images, prices, ...) is carried in
//! `attributes` untouched so re-fetches replace it wholesale.
//!
//! The merge rules here are the reference semantics for every store backend:
//! collections are keyed by handle, products by `(collection, id)`, and
//! re-merging a batch never produces duplicates.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One entry from `GET /collections.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    /// Site-unique slug, trimmed. Empty when upstream omitted it; such
    /// entries are not persisted.
    #[serde(default, deserialize_with = "trimmed_handle")]
    pub handle: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl CollectionSummary {
    #[must_use]
    pub fn new(handle: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            handle: handle.into().trim().to_owned(),
            title: Some(title.into()),
            attributes: Map::new(),
        }
    }

    #[must_use]
    pub fn has_handle(&self) -> bool {
        !self.handle.is_empty()
    }
}

/// Handles are path segments and merge keys; `null` reads as missing.
fn trimmed_handle<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let handle = Option::<String>::deserialize(deserializer)?;
    Ok(handle.map(|h| h.trim().to_owned()).unwrap_or_default())
}

/// One entry from `GET /collections/{handle}/products.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Shopify numeric product ID.
    pub id: i64,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ProductRecord {
    #[must_use]
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: Some(title.into()),
            attributes: Map::new(),
        }
    }
}

/// A collection as stored inside a [`SiteDocument`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub handle: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,

    #[serde(default)]
    pub products: Vec<ProductRecord>,
}

impl CollectionEntry {
    fn placeholder(handle: &str) -> Self {
        Self {
            handle: handle.to_owned(),
            title: None,
            attributes: Map::new(),
            products: Vec::new(),
        }
    }

    /// Product IDs in stored order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<i64> {
        self.products.iter().map(|p| p.id).collect()
    }
}

/// The persisted catalog of one site:
/// `{site, collections: [{handle, title, products: [...]}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteDocument {
    pub site: String,
    #[serde(default)]
    pub collections: Vec<CollectionEntry>,
}

/// Counts reported by a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    pub updated: usize,
}

impl MergeStats {
    #[must_use]
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

impl SiteDocument {
    #[must_use]
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            collections: Vec::new(),
        }
    }

    #[must_use]
    pub fn collection(&self, handle: &str) -> Option<&CollectionEntry> {
        self.collections.iter().find(|c| c.handle == handle)
    }

    /// Merges a page of collections by handle.
    ///
    /// An existing handle gets its title and attributes replaced and keeps its
    /// products; a new handle is appended. Entries without a handle are
    /// ignored.
    pub fn merge_collections(&mut self, batch: &[CollectionSummary]) -> MergeStats {
        let mut stats = MergeStats::default();
        for summary in latest_by_key(batch.iter().filter(|c| c.has_handle()), |c| {
            c.handle.as_str()
        }) {
            if let Some(entry) = self
                .collections
                .iter_mut()
                .find(|c| c.handle == summary.handle)
            {
                entry.title.clone_from(&summary.title);
                entry.attributes.clone_from(&summary.attributes);
                stats.updated += 1;
            } else {
                self.collections.push(CollectionEntry {
                    handle: summary.handle.clone(),
                    title: summary.title.clone(),
                    attributes: summary.attributes.clone(),
                    products: Vec::new(),
                });
                stats.inserted += 1;
            }
        }
        stats
    }

    /// Merges a page of products into one collection by product ID.
    ///
    /// A known ID has its record replaced wholesale; a new ID is appended.
    /// The collection is created untitled if it has not been seen yet.
    pub fn merge_products(&mut self, handle: &str, batch: &[ProductRecord]) -> MergeStats {
        let position = match self.collections.iter().position(|c| c.handle == handle) {
            Some(i) => i,
            None => {
                self.collections.push(CollectionEntry::placeholder(handle));
                self.collections.len() - 1
            }
        };
        let entry = &mut self.collections[position];

        let mut stats = MergeStats::default();
        for product in latest_by_key(batch.iter(), |p| p.id) {
            if let Some(existing) = entry.products.iter_mut().find(|p| p.id == product.id) {
                *existing = product.clone();
                stats.updated += 1;
            } else {
                entry.products.push(product.clone());
                stats.inserted += 1;
            }
        }
        stats
    }
}

/// Collapses duplicate keys so that the last occurrence wins, keeping the
/// position of the first occurrence.
///
/// Upstream pages occasionally repeat an entry; a single upsert statement
/// cannot touch the same row twice, so backends dedupe with this first.
pub fn latest_by_key<'a, T, K, I, F>(items: I, key: F) -> Vec<&'a T>
where
    I: IntoIterator<Item = &'a T>,
    K: Eq + Hash,
    F: Fn(&'a T) -> K,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<&'a T> = Vec::new();
    for item in items {
        match slots.get(&key(item)) {
            Some(&i) => out[i] = item,
            None => {
                slots.insert(key(item), out.len());
                out.push(item);
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
