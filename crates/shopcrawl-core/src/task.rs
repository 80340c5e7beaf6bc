//! Crawl tasks and their queue wire format.
//!
//! A task carries everything a worker needs to process it: the site, the
//! collection (for product pages) and the page number. There is no
//! server-side cursor, so any worker can pick up any task.
//!
//! ## Wire format
//!
//! ```json
//! {"type": "collection_page", "site": "https://shop.example", "page": 1}
//! {"type": "product_page", "site": "https://shop.example", "collection": "mugs", "page": 2}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// First page number of every pagination sequence.
pub const FIRST_PAGE: u32 = 1;

/// Default upper bound on the page number of any pagination sequence.
pub const DEFAULT_MAX_PAGES: u32 = 200;

/// One unit of crawl work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlTask {
    /// One page of `GET {site}/collections.json`.
    CollectionPage { site: String, page: u32 },
    /// One page of `GET {site}/collections/{collection}/products.json`.
    ProductPage {
        site: String,
        collection: String,
        page: u32,
    },
}

impl CrawlTask {
    #[must_use]
    pub fn collection_page(site: impl Into<String>, page: u32) -> Self {
        Self::CollectionPage {
            site: site.into(),
            page,
        }
    }

    #[must_use]
    pub fn product_page(site: impl Into<String>, collection: impl Into<String>, page: u32) -> Self {
        Self::ProductPage {
            site: site.into(),
            collection: collection.into(),
            page,
        }
    }

    #[must_use]
    pub fn site(&self) -> &str {
        match self {
            Self::CollectionPage { site, .. } | Self::ProductPage { site, .. } => site,
        }
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        match self {
            Self::CollectionPage { page, .. } | Self::ProductPage { page, .. } => *page,
        }
    }

    /// Collection handle for product-page tasks, `None` for collection pages.
    #[must_use]
    pub fn collection(&self) -> Option<&str> {
        match self {
            Self::CollectionPage { .. } => None,
            Self::ProductPage { collection, .. } => Some(collection),
        }
    }

    /// Value of the `type` field on the wire; also used as a log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CollectionPage { .. } => "collection_page",
            Self::ProductPage { .. } => "product_page",
        }
    }

    /// The same task for the following page.
    #[must_use]
    pub fn next_page(&self) -> Self {
        match self {
            Self::CollectionPage { site, page } => Self::CollectionPage {
                site: site.clone(),
                page: page.saturating_add(1),
            },
            Self::ProductPage {
                site,
                collection,
                page,
            } => Self::ProductPage {
                site: site.clone(),
                collection: collection.clone(),
                page: page.saturating_add(1),
            },
        }
    }

    /// Serializes the task to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TaskDecode`] if serialization fails, which only
    /// happens for non-UTF-8 data and is not expected in practice.
    pub fn to_json(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decodes and validates a task from its JSON wire form.
    ///
    /// # Errors
    ///
    /// - [`CoreError::TaskDecode`] if the payload does not match the wire shape.
    /// - [`CoreError::InvalidTask`] if the site or collection is blank or the
    ///   page number is zero.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CoreError> {
        let task: Self = serde_json::from_value(value)?;
        task.validate()?;
        Ok(task)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.site().trim().is_empty() {
            return Err(CoreError::InvalidTask {
                reason: "site is empty".to_owned(),
            });
        }
        if self.page() < FIRST_PAGE {
            return Err(CoreError::InvalidTask {
                reason: format!("page must be >= {FIRST_PAGE}, got {}", self.page()),
            });
        }
        if matches!(self.collection(), Some(c) if c.trim().is_empty()) {
            return Err(CoreError::InvalidTask {
                reason: "collection handle is empty".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for CrawlTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CollectionPage { site, page } => write!(f, "collections {site} page {page}"),
            Self::ProductPage {
                site,
                collection,
                page,
            } => write!(f, "products {site}/{collection} page {page}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn collection_page_wire_shape() {
        let task = CrawlTask::collection_page("https://shop.example", 1);
        assert_eq!(
            task.to_json().unwrap(),
            json!({"type": "collection_page", "site": "https://shop.example", "page": 1})
        );
    }

    #[test]
    fn product_page_wire_shape() {
        let task = CrawlTask::product_page("https://shop.example", "mugs", 3);
        assert_eq!(
            task.to_json().unwrap(),
            json!({
                "type": "product_page",
                "site": "https://shop.example",
                "collection": "mugs",
                "page": 3
            })
        );
    }

    #[test]
    fn decodes_product_page() {
        let task = CrawlTask::from_json(json!({
            "type": "product_page",
            "site": "shop.example",
            "collection": "hats",
            "page": 2
        }))
        .unwrap();
        assert_eq!(task, CrawlTask::product_page("shop.example", "hats", 2));
        assert_eq!(task.collection(), Some("hats"));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = CrawlTask::from_json(json!({"type": "sitemap", "site": "x", "page": 1}))
            .unwrap_err();
        assert!(matches!(err, CoreError::TaskDecode(_)), "got: {err:?}");
    }

    #[test]
    fn rejects_page_zero() {
        let err = CrawlTask::from_json(json!({"type": "collection_page", "site": "x", "page": 0}))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTask { .. }), "got: {err:?}");
    }

    #[test]
    fn rejects_blank_collection() {
        let err = CrawlTask::from_json(json!({
            "type": "product_page",
            "site": "x",
            "collection": " ",
            "page": 1
        }))
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTask { .. }), "got: {err:?}");
    }

    #[test]
    fn next_page_keeps_identity() {
        let task = CrawlTask::product_page("shop.example", "mugs", 4);
        assert_eq!(
            task.next_page(),
            CrawlTask::product_page("shop.example", "mugs", 5)
        );
        assert_eq!(
            CrawlTask::collection_page("shop.example", 1).next_page(),
            CrawlTask::collection_page("shop.example", 2)
        );
    }
}
