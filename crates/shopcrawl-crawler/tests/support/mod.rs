//! Test doubles shared by the crawler integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shopcrawl_core::{CollectionSummary, CrawlTask, ProductRecord, SiteDocument};
use shopcrawl_crawler::{
    CatalogStore, Delivery, DeliveryTag, MemoryCatalogStore, MemoryTaskQueue, Orchestrator,
    PageFetcher, QueueError, SiteValidator, StoreError, TaskQueue, Worker,
};
use shopcrawl_db::DbError;
use shopcrawl_scraper::pagination::has_more;
use shopcrawl_scraper::{Page, ScraperError};

/// Accepts a fixed set of sites and records every check.
#[derive(Default)]
pub struct StubValidator {
    valid: HashSet<String>,
    checks: Mutex<Vec<String>>,
}

impl StubValidator {
    pub fn accepting(sites: &[&str]) -> Self {
        Self {
            valid: sites.iter().map(|s| (*s).to_owned()).collect(),
            checks: Mutex::default(),
        }
    }

    pub fn checks(&self) -> Vec<String> {
        self.checks.lock().unwrap().clone()
    }
}

#[async_trait]
impl SiteValidator for StubValidator {
    async fn is_catalog_site(&self, site: &str) -> bool {
        self.checks.lock().unwrap().push(site.to_owned());
        self.valid.contains(site)
    }
}

/// Serves scripted pages. Anything not scripted is an empty page.
///
/// `has_more` is computed from the scripted batch and `page_size` exactly the
/// way the HTTP client computes it.
pub struct ScriptedFetcher {
    page_size: u32,
    collections: HashMap<(String, u32), Vec<CollectionSummary>>,
    products: HashMap<(String, String, u32), Vec<ProductRecord>>,
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            collections: HashMap::new(),
            products: HashMap::new(),
            failures: Mutex::default(),
            calls: Mutex::default(),
        }
    }

    pub fn collections(mut self, site: &str, page: u32, handles: &[&str]) -> Self {
        let batch = handles
            .iter()
            .map(|h| CollectionSummary::new(*h, h.to_uppercase()))
            .collect();
        self.collections.insert((site.to_owned(), page), batch);
        self
    }

    pub fn collection_batch(mut self, site: &str, page: u32, batch: Vec<CollectionSummary>) -> Self {
        self.collections.insert((site.to_owned(), page), batch);
        self
    }

    pub fn products(mut self, site: &str, collection: &str, page: u32, ids: &[i64]) -> Self {
        let batch = ids
            .iter()
            .map(|id| ProductRecord::new(*id, format!("Product {id}")))
            .collect();
        self.products
            .insert((site.to_owned(), collection.to_owned(), page), batch);
        self
    }

    /// The next `times` fetches of `call` (see [`Self::calls`]) fail with a 503.
    pub fn failing(self, call: &str, times: u32) -> Self {
        self.failures.lock().unwrap().insert(call.to_owned(), times);
        self
    }

    /// Every fetch made so far, as `"collections {site} {page}"` or
    /// `"products {site} {collection} {page}"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, call: String) -> Result<(), ScraperError> {
        // Give concurrently running workers a chance to interleave.
        tokio::task::yield_now().await;
        self.calls.lock().unwrap().push(call.clone());
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&call) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(ScraperError::UnexpectedStatus {
                    status: 503,
                    url: call,
                })
            }
            _ => Ok(()),
        }
    }

    fn page<T: Clone>(&self, batch: Option<&Vec<T>>) -> Page<T> {
        let items = batch.cloned().unwrap_or_default();
        let more = has_more(items.len(), self.page_size);
        Page {
            items,
            has_more: more,
        }
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_collection_page(
        &self,
        site: &str,
        page: u32,
    ) -> Result<Page<CollectionSummary>, ScraperError> {
        self.record(format!("collections {site} {page}")).await?;
        Ok(self.page(self.collections.get(&(site.to_owned(), page))))
    }

    async fn fetch_product_page(
        &self,
        site: &str,
        collection: &str,
        page: u32,
    ) -> Result<Page<ProductRecord>, ScraperError> {
        self.record(format!("products {site} {collection} {page}"))
            .await?;
        Ok(self.page(
            self.products
                .get(&(site.to_owned(), collection.to_owned(), page)),
        ))
    }
}

/// A wired-up pipeline over the in-memory backends.
pub struct Harness {
    pub validator: Arc<StubValidator>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub queue: Arc<MemoryTaskQueue>,
    pub store: Arc<MemoryCatalogStore>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new(validator: StubValidator, fetcher: ScriptedFetcher) -> Self {
        let validator = Arc::new(validator);
        let fetcher = Arc::new(fetcher);
        let queue = Arc::new(MemoryTaskQueue::recording());
        let store = Arc::new(MemoryCatalogStore::new());
        let orchestrator = Arc::new(Orchestrator::new(
            validator.clone(),
            fetcher.clone(),
            queue.clone(),
            store.clone(),
        ));
        Self {
            validator,
            fetcher,
            queue,
            store,
            orchestrator,
        }
    }

    pub fn worker(&self, id: usize) -> Worker {
        worker(id, self.orchestrator.clone())
    }
}

pub fn worker(id: usize, orchestrator: Arc<Orchestrator>) -> Worker {
    Worker::new(id, orchestrator, Duration::from_millis(10))
}

fn backend_down() -> DbError {
    DbError::Sqlx(sqlx::Error::PoolTimedOut)
}

/// A storefront that ignores `?page=`: every page is the same full batch.
pub struct SamePageFetcher {
    pub page_size: u32,
}

#[async_trait]
impl PageFetcher for SamePageFetcher {
    async fn fetch_collection_page(
        &self,
        _site: &str,
        _page: u32,
    ) -> Result<Page<CollectionSummary>, ScraperError> {
        let items = (0..self.page_size)
            .map(|i| CollectionSummary::new(format!("c{i}"), "Same"))
            .collect::<Vec<_>>();
        Ok(Page {
            has_more: has_more(items.len(), self.page_size),
            items,
        })
    }

    async fn fetch_product_page(
        &self,
        _site: &str,
        _collection: &str,
        _page: u32,
    ) -> Result<Page<ProductRecord>, ScraperError> {
        let items = (1..=i64::from(self.page_size))
            .map(|id| ProductRecord::new(id, "Same"))
            .collect::<Vec<_>>();
        Ok(Page {
            has_more: has_more(items.len(), self.page_size),
            items,
        })
    }
}

/// A catalog store whose backend is unreachable.
pub struct FailingStore;

#[async_trait]
impl CatalogStore for FailingStore {
    async fn merge_collections(
        &self,
        _site: &str,
        _batch: &[CollectionSummary],
    ) -> Result<u64, StoreError> {
        Err(backend_down().into())
    }

    async fn merge_products(
        &self,
        _site: &str,
        _collection: &str,
        _batch: &[ProductRecord],
    ) -> Result<u64, StoreError> {
        Err(backend_down().into())
    }

    async fn load_site_document(&self, _site: &str) -> Result<Option<SiteDocument>, StoreError> {
        Err(backend_down().into())
    }
}

/// A recording in-memory queue whose publishes can be made to fail while
/// dequeue, ack and nack keep working.
pub struct FlakyPublishQueue {
    pub inner: MemoryTaskQueue,
    failing: AtomicBool,
}

impl FlakyPublishQueue {
    pub fn new() -> Self {
        Self {
            inner: MemoryTaskQueue::recording(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn fail_publishes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskQueue for FlakyPublishQueue {
    async fn publish_all(&self, tasks: &[CrawlTask]) -> Result<(), QueueError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(backend_down().into());
        }
        self.inner.publish_all(tasks).await
    }

    async fn dequeue(&self) -> Result<Option<Delivery>, QueueError> {
        self.inner.dequeue().await
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), QueueError> {
        self.inner.ack(tag).await
    }

    async fn nack(&self, tag: DeliveryTag, reason: &str) -> Result<(), QueueError> {
        self.inner.nack(tag, reason).await
    }
}
