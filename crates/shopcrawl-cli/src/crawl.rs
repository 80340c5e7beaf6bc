//! Crawl command handlers: triggers, the worker pool, and document output.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shopcrawl_core::{AppConfig, SiteDocument};
use shopcrawl_crawler::{
    enqueue_collection_crawl, enqueue_crawl, CatalogStore, MemoryCatalogStore, MemoryTaskQueue,
    Orchestrator, PgCatalogStore, PgTaskQueue, Worker, WorkerStats,
};
use shopcrawl_scraper::{normalize_site, ShopifyClient};
use tokio::sync::watch;
use tokio::task::JoinSet;

fn build_client(config: &AppConfig) -> anyhow::Result<Arc<ShopifyClient>> {
    let client = ShopifyClient::new(
        config.fetch_timeout_secs,
        &config.user_agent,
        config.page_size,
    )
    .context("failed to build HTTP client")?;
    Ok(Arc::new(client))
}

fn poll_interval(config: &AppConfig) -> Duration {
    Duration::from_millis(config.queue_poll_interval_ms)
}

fn print_document(doc: &SiteDocument) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(doc)?);
    Ok(())
}

pub(crate) async fn run_enqueue(
    config: &AppConfig,
    site: &str,
    collection: Option<&str>,
) -> anyhow::Result<()> {
    let pool = crate::connect(config).await?;
    let queue = PgTaskQueue::from_app_config(pool, config);

    let task = match collection {
        Some(handle) => enqueue_collection_crawl(&queue, site, handle).await?,
        None => enqueue_crawl(&queue, site).await?,
    };
    println!("enqueued {task}");
    Ok(())
}

/// Runs `concurrency` workers against the Postgres queue until Ctrl-C or
/// SIGTERM, or until a worker loses the queue.
pub(crate) async fn run_workers(config: Arc<AppConfig>, concurrency: usize) -> anyhow::Result<()> {
    anyhow::ensure!(concurrency >= 1, "--concurrency must be at least 1");

    let pool = crate::connect(&config).await?;
    let client = build_client(&config)?;
    let orchestrator = Arc::new(
        Orchestrator::new(
            client.clone(),
            client,
            Arc::new(PgTaskQueue::from_app_config(pool.clone(), &config)),
            Arc::new(PgCatalogStore::new(pool)),
        )
        .with_max_pages(config.max_pages),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut workers = JoinSet::new();
    for id in 0..concurrency {
        let worker = Worker::new(id, Arc::clone(&orchestrator), poll_interval(&config));
        let rx = shutdown_rx.clone();
        workers.spawn(async move { worker.run(rx).await });
    }
    tracing::info!(concurrency, queue = %config.queue_name, "workers running");

    let mut shutdown = std::pin::pin!(crate::shutdown_signal());
    let mut stopping = false;
    let mut totals = WorkerStats::default();
    let mut failure: Option<anyhow::Error> = None;

    loop {
        tokio::select! {
            () = &mut shutdown, if !stopping => {
                tracing::info!("shutdown requested, finishing in-flight tasks");
                shutdown_tx.send_replace(true);
                stopping = true;
            }
            joined = workers.join_next() => {
                let Some(joined) = joined else { break };
                match joined {
                    Ok(Ok(stats)) => {
                        totals.completed += stats.completed;
                        totals.rejected += stats.rejected;
                        totals.retried += stats.retried;
                        totals.dropped += stats.dropped;
                    }
                    Ok(Err(e)) => {
                        failure.get_or_insert_with(|| e.into());
                    }
                    Err(e) => {
                        failure.get_or_insert_with(|| e.into());
                    }
                }
                if failure.is_some() && !stopping {
                    tracing::error!("a worker failed, stopping the rest");
                    shutdown_tx.send_replace(true);
                    stopping = true;
                }
            }
        }
    }

    println!(
        "workers stopped: {} completed, {} rejected, {} retried, {} dropped",
        totals.completed, totals.rejected, totals.retried, totals.dropped
    );
    match failure {
        Some(e) => Err(e.context("worker exited on queue failure")),
        None => Ok(()),
    }
}

pub(crate) async fn run_show(config: &AppConfig, site: &str) -> anyhow::Result<()> {
    let site = normalize_site(site)?;
    let pool = crate::connect(config).await?;
    let store = PgCatalogStore::new(pool);

    let doc = store
        .load_site_document(&site)
        .await?
        .with_context(|| format!("no catalog stored for {site}"))?;
    print_document(&doc)
}

/// Crawls `site` to completion with an in-memory queue and store.
///
/// Failed pages are retried after the configured redelivery delay until they
/// succeed.
pub(crate) async fn run_in_process(config: &AppConfig, site: &str) -> anyhow::Result<()> {
    let client = build_client(config)?;
    let queue = Arc::new(MemoryTaskQueue::with_redelivery_delay(Duration::from_secs(
        config.queue_redelivery_delay_secs,
    )));
    let store = Arc::new(MemoryCatalogStore::new());
    let orchestrator = Arc::new(
        Orchestrator::new(client.clone(), client, queue.clone(), store.clone())
            .with_max_pages(config.max_pages),
    );

    let task = enqueue_crawl(&*queue, site).await?;
    let worker = Worker::new(0, orchestrator, poll_interval(config));

    let mut totals = WorkerStats::default();
    loop {
        let stats = worker.drain().await?;
        totals.completed += stats.completed;
        totals.retried += stats.retried;
        if queue.pending() == 0 {
            break;
        }
        tokio::time::sleep(poll_interval(config)).await;
    }
    tracing::info!(
        pages = totals.completed,
        retries = totals.retried,
        "crawl finished"
    );

    let doc = store
        .document(task.site())
        .with_context(|| format!("{} is not a catalog site", task.site()))?;
    print_document(&doc)
}
