//! HTTP client for a storefront's public collection and product endpoints.

mod site;

use std::time::Duration;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use shopcrawl_core::{CollectionSummary, ProductRecord};

use crate::error::ScraperError;
use crate::pagination::{has_more, Page};
use crate::types::{parse_entries, CollectionsResponse, ProductsResponse};

pub use site::{extract_domain, normalize_site, site_base_url};

/// HTTP client for `collections.json` and `collections/{handle}/products.json`.
///
/// Every request carries the configured `User-Agent` and is bounded by the
/// configured timeout. Non-2xx responses and bodies that do not match the
/// expected envelope are returned as typed errors; nothing is retried here,
/// retries happen by task redelivery.
pub struct ShopifyClient {
    client: Client,
    page_size: u32,
}

impl ShopifyClient {
    /// Creates a `ShopifyClient` with a request timeout, `User-Agent`, and the
    /// `limit` to request per page.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(timeout_secs: u64, user_agent: &str, page_size: u32) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            page_size: page_size.max(1),
        })
    }

    /// Returns `true` if `site` answers `GET /collections.json` with a 2xx
    /// status and a `{"collections": [...]}` body.
    ///
    /// Any failure (bad URL, network error, non-2xx, unexpected body) yields
    /// `false`. The result is not cached.
    pub async fn is_catalog_site(&self, site: &str) -> bool {
        let check = async {
            let url = Self::collections_url(site, None)?;
            self.get_json::<CollectionsResponse>(url, site).await
        };
        match check.await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(site, error = %e, "catalog check failed");
                false
            }
        }
    }

    /// Fetches one page of a site's collections.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::InvalidShopUrl`]: `site` cannot be turned into a URL.
    /// - [`ScraperError::NotFound`]: HTTP 404.
    /// - [`ScraperError::UnexpectedStatus`]: any other non-2xx status.
    /// - [`ScraperError::Http`]: network or TLS failure, including timeouts.
    /// - [`ScraperError::Deserialize`]: body is not a `{"collections": [...]}` envelope.
    pub async fn fetch_collection_page(
        &self,
        site: &str,
        page: u32,
    ) -> Result<Page<CollectionSummary>, ScraperError> {
        let url = Self::collections_url(site, Some((page, self.page_size)))?;
        let response: CollectionsResponse = self.get_json(url, site).await?;

        let batch_len = response.collections.len();
        let context = format!("collections page {page} from {site}");
        Ok(Page {
            items: parse_entries(response.collections, &context),
            has_more: has_more(batch_len, self.page_size),
        })
    }

    /// Fetches one page of the products listed under `collection`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fetch_collection_page`], with the body expected to be a
    /// `{"products": [...]}` envelope.
    pub async fn fetch_product_page(
        &self,
        site: &str,
        collection: &str,
        page: u32,
    ) -> Result<Page<ProductRecord>, ScraperError> {
        let url = Self::products_url(site, collection, page, self.page_size)?;
        let response: ProductsResponse = self.get_json(url, site).await?;

        let batch_len = response.products.len();
        let context = format!("products page {page} of {collection} from {site}");
        Ok(Page {
            items: parse_entries(response.products, &context),
            has_more: has_more(batch_len, self.page_size),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, site: &str) -> Result<T, ScraperError> {
        let url_str = url.to_string();
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound { url: url_str });
        }

        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url_str,
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<T>(&body).map_err(|e| ScraperError::Deserialize {
            context: format!("{url_str} ({})", extract_domain(site)),
            source: e,
        })
    }

    /// Builds `{origin}/collections.json`, with `page`/`limit` when paging.
    fn collections_url(site: &str, paging: Option<(u32, u32)>) -> Result<Url, ScraperError> {
        let mut url = site_base_url(site)?;
        push_segments(&mut url, site, &["collections.json"])?;
        if let Some((page, limit)) = paging {
            append_paging(&mut url, page, limit);
        }
        Ok(url)
    }

    /// Builds `{origin}/collections/{handle}/products.json?page=N&limit=L`.
    ///
    /// The handle is percent-encoded as a single path segment.
    fn products_url(
        site: &str,
        collection: &str,
        page: u32,
        limit: u32,
    ) -> Result<Url, ScraperError> {
        let mut url = site_base_url(site)?;
        push_segments(&mut url, site, &["collections", collection, "products.json"])?;
        append_paging(&mut url, page, limit);
        Ok(url)
    }
}

fn push_segments(url: &mut Url, site: &str, segments: &[&str]) -> Result<(), ScraperError> {
    url.path_segments_mut()
        .map_err(|()| ScraperError::InvalidShopUrl {
            shop_url: site.to_owned(),
            reason: "URL cannot carry a path".to_owned(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(())
}

fn append_paging(url: &mut Url, page: u32, limit: u32) {
    url.query_pairs_mut()
        .append_pair("page", &page.to_string())
        .append_pair("limit", &limit.to_string());
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
