//! Operations that start a crawl.

use shopcrawl_core::{CrawlTask, FIRST_PAGE};
use shopcrawl_scraper::normalize_site;

use crate::error::TriggerError;
use crate::traits::TaskQueue;

/// Normalizes `raw_site` and publishes the first collections page for it.
///
/// Only the syntax of the address is checked here; whether it is really a
/// storefront is decided by the worker that picks the task up.
///
/// # Errors
///
/// - [`TriggerError::InvalidSite`] if `raw_site` is not a usable address.
/// - [`TriggerError::Queue`] if publishing fails.
pub async fn enqueue_crawl(
    queue: &dyn TaskQueue,
    raw_site: &str,
) -> Result<CrawlTask, TriggerError> {
    let site = normalize_site(raw_site)?;
    let task = CrawlTask::collection_page(site, FIRST_PAGE);
    queue.publish(&task).await?;
    tracing::info!(site = task.site(), "crawl enqueued");
    Ok(task)
}

/// Publishes the first products page of a single collection, re-crawling it
/// without walking the site's collections.
///
/// # Errors
///
/// - [`TriggerError::InvalidSite`] if `raw_site` is not a usable address.
/// - [`TriggerError::EmptyCollection`] if `handle` is blank.
/// - [`TriggerError::Queue`] if publishing fails.
pub async fn enqueue_collection_crawl(
    queue: &dyn TaskQueue,
    raw_site: &str,
    handle: &str,
) -> Result<CrawlTask, TriggerError> {
    let site = normalize_site(raw_site)?;
    let handle = handle.trim();
    if handle.is_empty() {
        return Err(TriggerError::EmptyCollection);
    }
    let task = CrawlTask::product_page(site, handle, FIRST_PAGE);
    queue.publish(&task).await?;
    tracing::info!(site = task.site(), collection = handle, "collection crawl enqueued");
    Ok(task)
}
