//! Per-task processing: validate, fetch, persist, enqueue follow-ups.
//!
//! The orchestrator never acks. It reports an outcome and the worker decides:
//! [`TaskOutcome`] means ack, [`TaskError`] means leave the task for
//! redelivery, which reruns it from the start. Every step is idempotent, so a
//! rerun after a partial success converges to the same catalog.

use std::sync::Arc;

use shopcrawl_core::{latest_by_key, CollectionSummary, CrawlTask, DEFAULT_MAX_PAGES, FIRST_PAGE};

use crate::error::TaskError;
use crate::traits::{CatalogStore, PageFetcher, SiteValidator, TaskQueue};

/// How a task finished when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Page fetched and merged; `follow_ups` tasks were published.
    Completed { fetched: usize, follow_ups: usize },
    /// The site does not expose a catalog. Nothing was fetched or written.
    Rejected,
}

pub struct Orchestrator {
    validator: Arc<dyn SiteValidator>,
    fetcher: Arc<dyn PageFetcher>,
    queue: Arc<dyn TaskQueue>,
    store: Arc<dyn CatalogStore>,
    max_pages: u32,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        validator: Arc<dyn SiteValidator>,
        fetcher: Arc<dyn PageFetcher>,
        queue: Arc<dyn TaskQueue>,
        store: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            validator,
            fetcher,
            queue,
            store,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Stops every listing after page `max_pages`, even when the last page
    /// was full. Guards against storefronts that ignore `?page=`.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(FIRST_PAGE);
        self
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<dyn TaskQueue> {
        &self.queue
    }

    /// Runs one task to completion.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Fetch`]: the page could not be fetched or parsed.
    /// - [`TaskError::Store`]: the merge failed.
    /// - [`TaskError::Enqueue`]: a follow-up could not be published.
    ///
    /// In every case the task should be retried whole.
    pub async fn process(&self, task: &CrawlTask) -> Result<TaskOutcome, TaskError> {
        let site = task.site();
        if !self.validator.is_catalog_site(site).await {
            tracing::warn!(site, "not a catalog site, dropping task");
            return Ok(TaskOutcome::Rejected);
        }

        let (fetched, follow_ups) = match task {
            CrawlTask::CollectionPage { site, page } => {
                self.process_collection_page(task, site, *page).await?
            }
            CrawlTask::ProductPage {
                site,
                collection,
                page,
            } => {
                self.process_product_page(task, site, collection, *page)
                    .await?
            }
        };

        let published = follow_ups.len();
        self.queue.publish_all(&follow_ups).await?;

        Ok(TaskOutcome::Completed {
            fetched,
            follow_ups: published,
        })
    }

    async fn process_collection_page(
        &self,
        task: &CrawlTask,
        site: &str,
        page: u32,
    ) -> Result<(usize, Vec<CrawlTask>), TaskError> {
        let fetched = self.fetcher.fetch_collection_page(site, page).await?;

        let (collections, unnamed): (Vec<_>, Vec<_>) =
            fetched.items.into_iter().partition(CollectionSummary::has_handle);
        if !unnamed.is_empty() {
            tracing::warn!(
                site,
                page,
                skipped = unnamed.len(),
                "skipping collections without a handle"
            );
        }

        let written = self.store.merge_collections(site, &collections).await?;
        tracing::info!(site, page, collections = collections.len(), written, "collections merged");

        let mut follow_ups = Vec::with_capacity(collections.len() + 1);
        if fetched.has_more {
            follow_ups.extend(self.next_page(task));
        }
        follow_ups.extend(
            latest_by_key(collections.iter(), |c| c.handle.as_str())
                .into_iter()
                .map(|c| CrawlTask::product_page(site, c.handle.clone(), FIRST_PAGE)),
        );

        Ok((collections.len(), follow_ups))
    }

    async fn process_product_page(
        &self,
        task: &CrawlTask,
        site: &str,
        collection: &str,
        page: u32,
    ) -> Result<(usize, Vec<CrawlTask>), TaskError> {
        let fetched = self
            .fetcher
            .fetch_product_page(site, collection, page)
            .await?;

        let written = self
            .store
            .merge_products(site, collection, &fetched.items)
            .await?;
        tracing::info!(
            site,
            collection,
            page,
            products = fetched.items.len(),
            written,
            "products merged"
        );

        let follow_ups = if fetched.has_more {
            self.next_page(task).into_iter().collect()
        } else {
            Vec::new()
        };
        Ok((fetched.items.len(), follow_ups))
    }

    fn next_page(&self, task: &CrawlTask) -> Option<CrawlTask> {
        if task.page() >= self.max_pages {
            tracing::warn!(
                site = task.site(),
                collection = task.collection(),
                page = task.page(),
                max_pages = self.max_pages,
                "page limit reached, not following further pages"
            );
            return None;
        }
        Some(task.next_page())
    }
}
