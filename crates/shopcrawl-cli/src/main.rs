mod crawl;
mod db;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use shopcrawl_core::{AppConfig, Environment};
use tracing_subscriber::EnvFilter;

use crate::db::DbCommands;

#[derive(Debug, Parser)]
#[command(name = "shopcrawl")]
#[command(about = "Queue-driven storefront catalog crawler")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Queue a crawl of a site, or of one of its collections
    Enqueue {
        /// Storefront address, e.g. `shop.example` or `https://shop.example`
        site: String,

        /// Re-crawl only this collection's products
        #[arg(long)]
        collection: Option<String>,
    },
    /// Consume crawl tasks until interrupted
    Worker {
        /// Number of concurrent workers (defaults to `SHOPCRAWL_WORKERS`)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Print the stored catalog of a site as JSON
    Show {
        site: String,
    },
    /// Crawl a site in-process without Postgres and print its catalog
    Crawl {
        site: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("shopcrawl: no command given, see --help");
        return Ok(());
    };

    let config = Arc::new(shopcrawl_core::load_app_config()?);
    init_tracing(&config)?;

    match command {
        Commands::Db { command } => db::run(&config, command).await,
        Commands::Enqueue { site, collection } => {
            crawl::run_enqueue(&config, &site, collection.as_deref()).await
        }
        Commands::Worker { concurrency } => {
            crawl::run_workers(Arc::clone(&config), concurrency.unwrap_or(config.workers)).await
        }
        Commands::Show { site } => crawl::run_show(&config, &site).await,
        Commands::Crawl { site } => crawl::run_in_process(&config, &site).await,
    }
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    let plain = plain_logs(&config.env);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(!plain)
        .with_target(!plain)
        .init();
    Ok(())
}

/// Production output has no colors or module targets.
fn plain_logs(env: &Environment) -> bool {
    matches!(env, Environment::Production)
}

/// Connects to Postgres using `DATABASE_URL` and the pool settings from `config`.
async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let database_url = config.require_database_url()?;
    let pool_config = shopcrawl_db::PoolConfig::from_app_config(config);
    Ok(shopcrawl_db::connect_pool(database_url, pool_config).await?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
