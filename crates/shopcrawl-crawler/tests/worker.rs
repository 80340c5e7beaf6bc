//! Worker loop lifecycle: shutdown and queue failure.

mod support;

use std::time::Duration;

use shopcrawl_core::CrawlTask;
use shopcrawl_crawler::{QueueError, TaskQueue};
use tokio::sync::watch;

use support::{Harness, ScriptedFetcher, StubValidator};

const SITE: &str = "shop.example";

fn harness() -> Harness {
    Harness::new(
        StubValidator::accepting(&[SITE]),
        ScriptedFetcher::new(250)
            .collections(SITE, 1, &["mugs"])
            .products(SITE, "mugs", 1, &[1]),
    )
}

#[tokio::test]
async fn run_stops_before_taking_work_once_shut_down() {
    let harness = harness();
    harness
        .queue
        .publish(&CrawlTask::collection_page(SITE, 1))
        .await
        .unwrap();
    let (_tx, rx) = watch::channel(true);

    let stats = harness.worker(0).run(rx).await.unwrap();

    assert_eq!(stats.handled(), 0);
    assert_eq!(harness.queue.pending(), 1);
}

#[tokio::test]
async fn run_processes_until_shutdown() {
    let harness = harness();
    harness
        .queue
        .publish(&CrawlTask::collection_page(SITE, 1))
        .await
        .unwrap();
    let (tx, rx) = watch::channel(false);
    let worker = harness.worker(0);

    let run = tokio::spawn(async move { worker.run(rx).await });

    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.queue.pending() > 0 || harness.queue.acked() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("worker never drained the queue");

    tx.send(true).unwrap();
    let stats = run.await.unwrap().unwrap();

    assert_eq!(stats.completed, 2);
    assert_eq!(
        harness.store.document(SITE).unwrap().collection("mugs").unwrap().product_ids(),
        [1]
    );
}

#[tokio::test]
async fn run_stops_when_shutdown_sender_is_dropped() {
    let harness = harness();
    let (tx, rx) = watch::channel(false);
    let worker = harness.worker(0);

    let run = tokio::spawn(async move { worker.run(rx).await });
    drop(tx);

    let stats = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("worker did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(stats.handled(), 0);
}

#[tokio::test]
async fn queue_failure_ends_the_worker() {
    let harness = harness();
    harness.queue.close();
    let (_tx, rx) = watch::channel(false);

    let result = harness.worker(0).run(rx).await;

    assert!(matches!(result, Err(QueueError::Closed)));
}
