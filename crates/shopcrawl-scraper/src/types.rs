//! Response envelopes for the public storefront JSON endpoints.
//!
//! ## Observed shape
//!
//! `GET /collections.json` returns `{"collections": [...]}` where each entry
//! carries `id`, `handle`, `title`, `updated_at`, `published_at`,
//! `products_count` and an optional `image`.
//!
//! `GET /collections/{handle}/products.json` returns `{"products": [...]}`
//! with the same product objects as `/products.json` (`id`, `title`,
//! `handle`, `variants`, `images`, ...).
//!
//! Only the envelope is strict. Entries are kept as raw JSON here and parsed
//! one by one so a single odd entry does not discard the whole page.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Top-level response from `GET /collections.json`.
#[derive(Debug, Deserialize)]
pub struct CollectionsResponse {
    pub collections: Vec<Value>,
}

/// Top-level response from `GET /collections/{handle}/products.json`.
#[derive(Debug, Deserialize)]
pub struct ProductsResponse {
    pub products: Vec<Value>,
}

/// Parses each raw entry into `T`, dropping entries that do not fit.
///
/// Dropped entries are logged with `context` so a shape change upstream is
/// visible without failing the page.
pub(crate) fn parse_entries<T: DeserializeOwned>(raw: Vec<Value>, context: &str) -> Vec<T> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<T>(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(context, index, error = %e, "skipping unparsable entry");
                None
            }
        })
        .collect()
}
