//! Domain types shared by every shopcrawl crate: crawl tasks, catalog
//! records, the per-site document with its merge rules, and environment
//! configuration.

mod app_config;
pub mod catalog;
mod config;
pub mod task;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use catalog::{
    latest_by_key, CollectionEntry, CollectionSummary, MergeStats, ProductRecord, SiteDocument,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use task::{CrawlTask, DEFAULT_MAX_PAGES, FIRST_PAGE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("task payload is not valid JSON for a crawl task: {0}")]
    TaskDecode(#[from] serde_json::Error),

    #[error("invalid crawl task: {reason}")]
    InvalidTask { reason: String },
}
