//! Production implementations of the seam traits.

use std::time::Duration;

use async_trait::async_trait;
use shopcrawl_core::{AppConfig, CollectionSummary, CrawlTask, ProductRecord, SiteDocument};
use shopcrawl_scraper::{Page, ScraperError, ShopifyClient};
use sqlx::PgPool;

use crate::error::{QueueError, StoreError};
use crate::traits::{
    CatalogStore, Delivery, DeliveryTag, PageFetcher, SiteValidator, TaskQueue,
};

#[async_trait]
impl SiteValidator for ShopifyClient {
    async fn is_catalog_site(&self, site: &str) -> bool {
        ShopifyClient::is_catalog_site(self, site).await
    }
}

#[async_trait]
impl PageFetcher for ShopifyClient {
    async fn fetch_collection_page(
        &self,
        site: &str,
        page: u32,
    ) -> Result<Page<CollectionSummary>, ScraperError> {
        ShopifyClient::fetch_collection_page(self, site, page).await
    }

    async fn fetch_product_page(
        &self,
        site: &str,
        collection: &str,
        page: u32,
    ) -> Result<Page<ProductRecord>, ScraperError> {
        ShopifyClient::fetch_product_page(self, site, collection, page).await
    }
}

/// [`TaskQueue`] over the `crawl_tasks` table.
///
/// A dequeued message is leased for `lease`; if the worker dies before acking,
/// the lease runs out and the message is handed to another worker.
#[derive(Debug, Clone)]
pub struct PgTaskQueue {
    pool: PgPool,
    queue_name: String,
    lease: Duration,
    redelivery_delay: Duration,
}

impl PgTaskQueue {
    #[must_use]
    pub fn new(
        pool: PgPool,
        queue_name: impl Into<String>,
        lease: Duration,
        redelivery_delay: Duration,
    ) -> Self {
        Self {
            pool,
            queue_name: queue_name.into(),
            lease,
            redelivery_delay,
        }
    }

    #[must_use]
    pub fn from_app_config(pool: PgPool, config: &AppConfig) -> Self {
        Self::new(
            pool,
            config.queue_name.clone(),
            Duration::from_secs(config.queue_lease_secs),
            Duration::from_secs(config.queue_redelivery_delay_secs),
        )
    }
}

#[async_trait]
impl TaskQueue for PgTaskQueue {
    async fn publish_all(&self, tasks: &[CrawlTask]) -> Result<(), QueueError> {
        let payloads = tasks
            .iter()
            .map(CrawlTask::to_json)
            .collect::<Result<Vec<_>, _>>()?;
        shopcrawl_db::publish_tasks(&self.pool, &self.queue_name, &payloads).await?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Delivery>, QueueError> {
        let row =
            shopcrawl_db::lease_next_task(&self.pool, &self.queue_name, self.lease.as_secs())
                .await?;
        Ok(row.map(|row| Delivery {
            tag: DeliveryTag {
                id: row.id,
                lease_token: row.lease_token,
            },
            payload: row.payload,
            attempts: u32::try_from(row.attempts).unwrap_or(u32::MAX),
        }))
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), QueueError> {
        if !shopcrawl_db::ack_task(&self.pool, tag.id, tag.lease_token).await? {
            tracing::warn!(delivery_id = tag.id, "ack ignored: lease no longer held");
        }
        Ok(())
    }

    async fn nack(&self, tag: DeliveryTag, reason: &str) -> Result<(), QueueError> {
        let released = shopcrawl_db::release_task(
            &self.pool,
            tag.id,
            tag.lease_token,
            self.redelivery_delay.as_secs(),
            reason,
        )
        .await?;
        if !released {
            tracing::warn!(delivery_id = tag.id, "nack ignored: lease no longer held");
        }
        Ok(())
    }
}

/// [`CatalogStore`] over the `sites`, `site_collections` and
/// `collection_products` tables.
#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn merge_collections(
        &self,
        site: &str,
        batch: &[CollectionSummary],
    ) -> Result<u64, StoreError> {
        Ok(shopcrawl_db::merge_collections(&self.pool, site, batch).await?)
    }

    async fn merge_products(
        &self,
        site: &str,
        collection: &str,
        batch: &[ProductRecord],
    ) -> Result<u64, StoreError> {
        Ok(shopcrawl_db::merge_products(&self.pool, site, collection, batch).await?)
    }

    async fn load_site_document(&self, site: &str) -> Result<Option<SiteDocument>, StoreError> {
        Ok(shopcrawl_db::load_site_document(&self.pool, site).await?)
    }
}
