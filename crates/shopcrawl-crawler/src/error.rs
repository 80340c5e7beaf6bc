use shopcrawl_core::CoreError;
use shopcrawl_db::DbError;
use shopcrawl_scraper::ScraperError;
use thiserror::Error;

/// Failure talking to the task queue. Fatal to the worker that sees it.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(#[from] DbError),

    #[error("failed to encode task: {0}")]
    Encode(#[from] CoreError),

    #[error("queue is closed")]
    Closed,
}

/// Failure writing to or reading from the catalog store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("catalog backend error: {0}")]
    Backend(#[from] DbError),
}

/// A task that could not be completed and must be redelivered.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] ScraperError),

    #[error("store write failed: {0}")]
    Store(#[from] StoreError),

    #[error("follow-up publish failed: {0}")]
    Enqueue(#[from] QueueError),
}

/// Rejected trigger input, or a failure publishing the first task.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    InvalidSite(#[from] ScraperError),

    #[error("collection handle is empty")]
    EmptyCollection,

    #[error(transparent)]
    Queue(#[from] QueueError),
}
