#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Required only by commands that touch Postgres.
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// Requested `limit` per upstream page; a full page means more may follow.
    pub page_size: u32,
    /// Last page number followed in any one listing.
    pub max_pages: u32,
    pub workers: usize,
    pub queue_name: String,
    pub queue_lease_secs: u64,
    pub queue_poll_interval_ms: u64,
    pub queue_redelivery_delay_secs: u64,
}

impl AppConfig {
    /// Returns the database URL or the error a Postgres-backed command
    /// should surface when it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::MissingEnvVar`] when `DATABASE_URL` is unset.
    pub fn require_database_url(&self) -> Result<&str, crate::ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| crate::ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .field("workers", &self.workers)
            .field("queue_name", &self.queue_name)
            .field("queue_lease_secs", &self.queue_lease_secs)
            .field("queue_poll_interval_ms", &self.queue_poll_interval_ms)
            .field(
                "queue_redelivery_delay_secs",
                &self.queue_redelivery_delay_secs,
            )
            .finish()
    }
}
