use crate::app_config::{AppConfig, Environment};
use crate::task::DEFAULT_MAX_PAGES;
use crate::ConfigError;

/// Largest `limit` the public Shopify JSON endpoints honor.
const MAX_PAGE_SIZE: u32 = 250;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = lookup("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
    let env = parse_environment(&or_default("SHOPCRAWL_ENV", "development"))?;
    let log_level = or_default("SHOPCRAWL_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("SHOPCRAWL_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SHOPCRAWL_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SHOPCRAWL_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let fetch_timeout_secs = parse_u64("SHOPCRAWL_FETCH_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("SHOPCRAWL_USER_AGENT", "shopcrawl/0.1 (catalog-crawler)");

    let page_size = parse_u32("SHOPCRAWL_PAGE_SIZE", "250")?;
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(invalid(
            "SHOPCRAWL_PAGE_SIZE",
            format!("must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"),
        ));
    }

    let max_pages = parse_u32("SHOPCRAWL_MAX_PAGES", &DEFAULT_MAX_PAGES.to_string())?;
    if max_pages == 0 {
        return Err(invalid("SHOPCRAWL_MAX_PAGES", "must be at least 1".to_string()));
    }

    let workers = parse_usize("SHOPCRAWL_WORKERS", "1")?;
    if workers == 0 {
        return Err(invalid("SHOPCRAWL_WORKERS", "must be at least 1".to_string()));
    }

    let queue_name = or_default("SHOPCRAWL_QUEUE_NAME", "shopify");
    let queue_lease_secs = parse_u64("SHOPCRAWL_QUEUE_LEASE_SECS", "300")?;
    let queue_poll_interval_ms = parse_u64("SHOPCRAWL_QUEUE_POLL_INTERVAL_MS", "1000")?;
    let queue_redelivery_delay_secs = parse_u64("SHOPCRAWL_QUEUE_REDELIVERY_DELAY_SECS", "5")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        fetch_timeout_secs,
        user_agent,
        page_size,
        max_pages,
        workers,
        queue_name,
        queue_lease_secs,
        queue_poll_interval_ms,
        queue_redelivery_delay_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SHOPCRAWL_ENV".to_string(),
            reason: format!("expected development, test, or production; got \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
