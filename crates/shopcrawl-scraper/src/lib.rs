pub mod client;
pub mod error;
pub mod pagination;
pub mod types;

pub use client::{normalize_site, site_base_url, ShopifyClient};
pub use error::ScraperError;
pub use pagination::Page;
