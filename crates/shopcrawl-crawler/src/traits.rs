//! Seams between the orchestrator and the outside world.
//!
//! Production wiring uses [`shopcrawl_scraper::ShopifyClient`] for the first
//! two traits and the Postgres adapters for the last two; tests and the
//! single-process `crawl` command use [`crate::memory`].

use async_trait::async_trait;
use shopcrawl_core::{CollectionSummary, CrawlTask, ProductRecord, SiteDocument};
use shopcrawl_scraper::{Page, ScraperError};
use uuid::Uuid;

use crate::error::{QueueError, StoreError};

#[async_trait]
pub trait SiteValidator: Send + Sync {
    /// `true` if `site` exposes a storefront catalog API. Never errors.
    async fn is_catalog_site(&self, site: &str) -> bool;
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_collection_page(
        &self,
        site: &str,
        page: u32,
    ) -> Result<Page<CollectionSummary>, ScraperError>;

    async fn fetch_product_page(
        &self,
        site: &str,
        collection: &str,
        page: u32,
    ) -> Result<Page<ProductRecord>, ScraperError>;
}

/// Identifies one delivery of one message. Acks and nacks carrying a stale
/// tag (the lease expired and someone else holds the message) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeliveryTag {
    pub id: i64,
    pub lease_token: Uuid,
}

/// A message handed to exactly one consumer until it is acked, nacked or its
/// lease runs out.
///
/// The payload is undecoded so that a malformed message can still be
/// acknowledged and dropped.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub payload: serde_json::Value,
    /// 1 on first delivery, incremented on every redelivery.
    pub attempts: u32,
}

/// Durable at-least-once work queue with manual acknowledgment.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Publishes `tasks` in order. Either all are published or an error is
    /// returned.
    async fn publish_all(&self, tasks: &[CrawlTask]) -> Result<(), QueueError>;

    async fn publish(&self, task: &CrawlTask) -> Result<(), QueueError> {
        self.publish_all(std::slice::from_ref(task)).await
    }

    /// Takes the next available message, or `None` if there is nothing to do
    /// right now. Callers poll.
    async fn dequeue(&self) -> Result<Option<Delivery>, QueueError>;

    async fn ack(&self, tag: DeliveryTag) -> Result<(), QueueError>;

    /// Returns the message to the queue for redelivery. `reason` is kept for
    /// operators where the backend can store it.
    async fn nack(&self, tag: DeliveryTag, reason: &str) -> Result<(), QueueError>;
}

/// Idempotent merge layer over the per-site catalog document.
///
/// Merges return the number of elements written.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn merge_collections(
        &self,
        site: &str,
        batch: &[CollectionSummary],
    ) -> Result<u64, StoreError>;

    async fn merge_products(
        &self,
        site: &str,
        collection: &str,
        batch: &[ProductRecord],
    ) -> Result<u64, StoreError>;

    async fn load_site_document(&self, site: &str) -> Result<Option<SiteDocument>, StoreError>;
}
