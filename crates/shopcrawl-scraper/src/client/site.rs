//! Site normalization and base-URL resolution.

use reqwest::Url;

use crate::error::ScraperError;

/// Normalizes a storefront address into its site key.
///
/// The key is the lowercased host (plus a non-default port), with the scheme
/// kept only when the caller gave one. Paths, queries and trailing slashes are
/// dropped, so `"https://Shop.Example/collections/all/"` becomes
/// `"https://shop.example"` and `"shop.example/"` becomes `"shop.example"`.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidShopUrl`] if the input is blank, contains
/// whitespace, is not `http`/`https`, or has no host.
pub fn normalize_site(raw: &str) -> Result<String, ScraperError> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| ScraperError::InvalidShopUrl {
        shop_url: raw.to_owned(),
        reason: reason.to_owned(),
    };

    if trimmed.is_empty() {
        return Err(invalid("site is empty"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(invalid("site contains whitespace"));
    }

    let has_scheme = trimmed.contains("://");
    let url = parse_with_default_scheme(trimmed).map_err(|e| invalid(&e))?;
    let authority = authority(&url).ok_or_else(|| invalid("site has no host"))?;

    if has_scheme {
        Ok(format!("{}://{authority}", url.scheme()))
    } else {
        Ok(authority)
    }
}

/// Resolves a site key to the origin its endpoints are fetched from.
///
/// Sites stored without a scheme are fetched over `https`.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidShopUrl`] if the site cannot be parsed as
/// an `http`/`https` URL with a host.
pub fn site_base_url(site: &str) -> Result<Url, ScraperError> {
    let url = parse_with_default_scheme(site.trim()).map_err(|reason| {
        ScraperError::InvalidShopUrl {
            shop_url: site.to_owned(),
            reason,
        }
    })?;
    let authority = authority(&url).ok_or_else(|| ScraperError::InvalidShopUrl {
        shop_url: site.to_owned(),
        reason: "site has no host".to_owned(),
    })?;
    Url::parse(&format!("{}://{authority}/", url.scheme())).map_err(|e| {
        ScraperError::InvalidShopUrl {
            shop_url: site.to_owned(),
            reason: e.to_string(),
        }
    })
}

/// Extracts the hostname from a site for use in log fields.
///
/// Falls back to the input if it cannot be parsed.
#[must_use]
pub fn extract_domain(site: &str) -> String {
    parse_with_default_scheme(site)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| site.to_owned())
}

fn parse_with_default_scheme(site: &str) -> Result<Url, String> {
    let candidate = if site.contains("://") {
        site.to_owned()
    } else {
        format!("https://{site}")
    };
    let url = Url::parse(&candidate).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme \"{other}\"")),
    }
}

fn authority(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}
