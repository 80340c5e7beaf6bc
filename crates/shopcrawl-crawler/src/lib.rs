//! Queue-driven crawl pipeline.
//!
//! Work is a stream of self-describing [`CrawlTask`](shopcrawl_core::CrawlTask)s.
//! A [`Worker`] takes one from the [`TaskQueue`], the [`Orchestrator`] fetches
//! the page it names, merges it into the [`CatalogStore`] and publishes the
//! tasks for whatever pages that one revealed, and only then is the task
//! acknowledged.

pub mod adapters;
mod error;
pub mod memory;
mod orchestrator;
mod traits;
mod trigger;
mod worker;

pub use adapters::{PgCatalogStore, PgTaskQueue};
pub use error::{QueueError, StoreError, TaskError, TriggerError};
pub use memory::{MemoryCatalogStore, MemoryTaskQueue};
pub use orchestrator::{Orchestrator, TaskOutcome};
pub use traits::{CatalogStore, Delivery, DeliveryTag, PageFetcher, SiteValidator, TaskQueue};
pub use trigger::{enqueue_collection_crawl, enqueue_crawl};
pub use worker::{Handled, Worker, WorkerStats};
