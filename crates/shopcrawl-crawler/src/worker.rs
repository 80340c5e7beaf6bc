//! The consume → process → ack loop.

use std::sync::Arc;
use std::time::Duration;

use shopcrawl_core::CrawlTask;
use tokio::sync::watch;
use tracing::Instrument;

use crate::error::QueueError;
use crate::orchestrator::{Orchestrator, TaskOutcome};
use crate::traits::{Delivery, DeliveryTag};

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// Processed and acked.
    Completed,
    /// Site rejected by the validator; acked.
    Rejected,
    /// Task failed; nacked for redelivery.
    Retried,
    /// Payload is not a crawl task; acked and dropped.
    Dropped,
}

/// Running totals for one worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: usize,
    pub rejected: usize,
    pub retried: usize,
    pub dropped: usize,
}

impl WorkerStats {
    fn record(&mut self, handled: Handled) {
        match handled {
            Handled::Completed => self.completed += 1,
            Handled::Rejected => self.rejected += 1,
            Handled::Retried => self.retried += 1,
            Handled::Dropped => self.dropped += 1,
        }
    }

    #[must_use]
    pub fn handled(&self) -> usize {
        self.completed + self.rejected + self.retried + self.dropped
    }
}

/// One consumer. Holds at most one delivery at a time.
///
/// Task failures are handled here and never stop the worker; a queue error
/// does, since without the queue there is nothing left to do and the
/// in-flight delivery will be redelivered once its lease lapses.
pub struct Worker {
    id: usize,
    orchestrator: Arc<Orchestrator>,
    poll_interval: Duration,
}

impl Worker {
    #[must_use]
    pub fn new(id: usize, orchestrator: Arc<Orchestrator>, poll_interval: Duration) -> Self {
        Self {
            id,
            orchestrator,
            poll_interval,
        }
    }

    /// Consumes until `shutdown` turns `true` (or its sender is dropped).
    ///
    /// Shutdown is checked between deliveries only; a task in progress always
    /// runs to its ack or nack.
    ///
    /// # Errors
    ///
    /// Returns the [`QueueError`] that ended the loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<WorkerStats, QueueError> {
        let span = tracing::info_span!("worker", worker_id = self.id);
        async move {
            tracing::info!("worker started");
            let mut stats = WorkerStats::default();
            loop {
                if *shutdown.borrow() {
                    break;
                }
                match self.run_once().await {
                    Ok(Some(handled)) => stats.record(handled),
                    Ok(None) => {
                        tokio::select! {
                            () = tokio::time::sleep(self.poll_interval) => {}
                            changed = shutdown.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "queue failure, worker exiting");
                        return Err(e);
                    }
                }
            }
            tracing::info!(
                completed = stats.completed,
                rejected = stats.rejected,
                retried = stats.retried,
                dropped = stats.dropped,
                "worker stopped"
            );
            Ok(stats)
        }
        .instrument(span)
        .await
    }

    /// Handles deliveries until the queue has nothing available.
    ///
    /// A task that keeps failing keeps being redelivered; with a queue that
    /// redelivers immediately this only returns once it succeeds.
    ///
    /// # Errors
    ///
    /// Returns the first [`QueueError`].
    pub async fn drain(&self) -> Result<WorkerStats, QueueError> {
        let mut stats = WorkerStats::default();
        while let Some(handled) = self.run_once().await? {
            stats.record(handled);
        }
        Ok(stats)
    }

    /// Dequeues and handles a single delivery. `None` if the queue had
    /// nothing available.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if dequeue, ack or nack fails.
    pub async fn run_once(&self) -> Result<Option<Handled>, QueueError> {
        let Some(delivery) = self.orchestrator.queue().dequeue().await? else {
            return Ok(None);
        };
        self.handle(delivery).await.map(Some)
    }

    async fn handle(&self, delivery: Delivery) -> Result<Handled, QueueError> {
        let queue = self.orchestrator.queue();
        let Delivery {
            tag,
            payload,
            attempts,
        } = delivery;

        let task = match CrawlTask::from_json(payload) {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(delivery_id = tag.id, error = %e, "undecodable task, dropping");
                queue.ack(tag).await?;
                return Ok(Handled::Dropped);
            }
        };

        let span = tracing::info_span!(
            "task",
            delivery_id = tag.id,
            attempts,
            kind = task.kind(),
            site = task.site(),
            collection = task.collection(),
            page = task.page(),
        );

        self.process(&task, tag).instrument(span).await
    }

    async fn process(&self, task: &CrawlTask, tag: DeliveryTag) -> Result<Handled, QueueError> {
        let queue = self.orchestrator.queue();
        match self.orchestrator.process(task).await {
            Ok(TaskOutcome::Completed {
                fetched,
                follow_ups,
            }) => {
                queue.ack(tag).await?;
                tracing::info!(fetched, follow_ups, "task completed");
                Ok(Handled::Completed)
            }
            Ok(TaskOutcome::Rejected) => {
                queue.ack(tag).await?;
                Ok(Handled::Rejected)
            }
            Err(e) => {
                tracing::warn!(error = %e, "task failed, will be redelivered");
                queue.nack(tag, &e.to_string()).await?;
                Ok(Handled::Retried)
            }
        }
    }
}
