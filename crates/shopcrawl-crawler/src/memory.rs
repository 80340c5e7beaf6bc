//! In-process queue and store backends.
//!
//! Both keep their state behind a `std::sync::Mutex` that is never held across
//! an `.await`. They follow the same delivery and merge rules as the Postgres
//! backends, so the orchestrator behaves identically on either.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use shopcrawl_core::{CollectionSummary, CrawlTask, ProductRecord, SiteDocument};
use uuid::Uuid;

use crate::error::{QueueError, StoreError};
use crate::traits::{CatalogStore, Delivery, DeliveryTag, TaskQueue};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Message {
    id: i64,
    payload: serde_json::Value,
    attempts: u32,
    available_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: i64,
    ready: VecDeque<Message>,
    leased: HashMap<DeliveryTag, Message>,
    published: Vec<CrawlTask>,
    acked: usize,
    nacked: usize,
    closed: bool,
}

/// FIFO queue held in memory.
///
/// A dequeued message stays leased until it is acked (removed) or nacked
/// (returned to the back of the queue after the redelivery delay). A queue
/// built with [`MemoryTaskQueue::recording`] also keeps every task published
/// to it, for assertions.
#[derive(Debug, Default)]
pub struct MemoryTaskQueue {
    state: Mutex<QueueState>,
    redelivery_delay: Duration,
    record_published: bool,
}

impl MemoryTaskQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that keeps a log of published tasks, see [`Self::published`].
    #[must_use]
    pub fn recording() -> Self {
        Self {
            record_published: true,
            ..Self::default()
        }
    }

    /// Nacked messages become available again only after `delay`.
    #[must_use]
    pub fn with_redelivery_delay(delay: Duration) -> Self {
        Self {
            redelivery_delay: delay,
            ..Self::default()
        }
    }

    /// Enqueues a raw payload without going through [`CrawlTask`] encoding.
    pub fn push_raw(&self, payload: serde_json::Value) {
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        state.ready.push_back(Message {
            id,
            payload,
            attempts: 0,
            available_at: Instant::now(),
        });
    }

    /// Every task published so far, in publish order, including ones already
    /// consumed. Always empty unless the queue is [recording](Self::recording).
    #[must_use]
    pub fn published(&self) -> Vec<CrawlTask> {
        lock(&self.state).published.clone()
    }

    #[must_use]
    pub fn acked(&self) -> usize {
        lock(&self.state).acked
    }

    #[must_use]
    pub fn nacked(&self) -> usize {
        lock(&self.state).nacked
    }

    /// Messages not yet acknowledged, leased or not.
    #[must_use]
    pub fn pending(&self) -> usize {
        let state = lock(&self.state);
        state.ready.len() + state.leased.len()
    }

    /// Makes every further operation fail with [`QueueError::Closed`], the
    /// way a lost broker connection would.
    pub fn close(&self) {
        lock(&self.state).closed = true;
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn publish_all(&self, tasks: &[CrawlTask]) -> Result<(), QueueError> {
        let payloads = tasks
            .iter()
            .map(CrawlTask::to_json)
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = lock(&self.state);
        if state.closed {
            return Err(QueueError::Closed);
        }
        let now = Instant::now();
        for payload in payloads {
            let id = state.next_id;
            state.next_id += 1;
            state.ready.push_back(Message {
                id,
                payload,
                attempts: 0,
                available_at: now,
            });
        }
        if self.record_published {
            state.published.extend_from_slice(tasks);
        }
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Delivery>, QueueError> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(QueueError::Closed);
        }
        let now = Instant::now();
        let Some(position) = state.ready.iter().position(|m| m.available_at <= now) else {
            return Ok(None);
        };
        let Some(mut message) = state.ready.remove(position) else {
            return Ok(None);
        };

        message.attempts += 1;
        let tag = DeliveryTag {
            id: message.id,
            lease_token: Uuid::new_v4(),
        };
        let delivery = Delivery {
            tag,
            payload: message.payload.clone(),
            attempts: message.attempts,
        };
        state.leased.insert(tag, message);
        Ok(Some(delivery))
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), QueueError> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(QueueError::Closed);
        }
        if state.leased.remove(&tag).is_some() {
            state.acked += 1;
        }
        Ok(())
    }

    async fn nack(&self, tag: DeliveryTag, _reason: &str) -> Result<(), QueueError> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(QueueError::Closed);
        }
        if let Some(mut message) = state.leased.remove(&tag) {
            message.available_at = Instant::now() + self.redelivery_delay;
            state.ready.push_back(message);
            state.nacked += 1;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Site documents held in memory, merged with the [`SiteDocument`] rules.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    documents: Mutex<HashMap<String, SiteDocument>>,
}

impl MemoryCatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn document(&self, site: &str) -> Option<SiteDocument> {
        lock(&self.documents).get(site).cloned()
    }
}

fn written(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn merge_collections(
        &self,
        site: &str,
        batch: &[CollectionSummary],
    ) -> Result<u64, StoreError> {
        let mut documents = lock(&self.documents);
        let doc = documents
            .entry(site.to_owned())
            .or_insert_with(|| SiteDocument::new(site));
        Ok(written(doc.merge_collections(batch).total()))
    }

    async fn merge_products(
        &self,
        site: &str,
        collection: &str,
        batch: &[ProductRecord],
    ) -> Result<u64, StoreError> {
        let mut documents = lock(&self.documents);
        let doc = documents
            .entry(site.to_owned())
            .or_insert_with(|| SiteDocument::new(site));
        Ok(written(doc.merge_products(collection, batch).total()))
    }

    async fn load_site_document(&self, site: &str) -> Result<Option<SiteDocument>, StoreError> {
        Ok(self.document(site))
    }
}
