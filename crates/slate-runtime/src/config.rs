//! Connection configuration.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

/// How to open a database.
///
/// Every connection is opened with foreign-key enforcement on and, for
/// file databases, the WAL journal so readers never block on the writer.
///
/// ```rust
/// use std::time::Duration;
/// use slate_runtime::DatabaseConfig;
///
/// let config = DatabaseConfig::new("sqlite://app.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(2));
/// assert_eq!(config.busy_timeout_ms, 2000);
/// assert!(!config.is_memory());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlite:` URL.
    pub url: String,
    /// Pool size. In-memory databases always use a single connection.
    pub max_connections: u32,
    /// How long a connection waits on a lock held by another process.
    pub busy_timeout_ms: u64,
    /// Create the database file if it does not exist.
    pub create_if_missing: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
            create_if_missing: true,
        }
    }
}

impl DatabaseConfig {
    /// Configuration for `url` with default settings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// A private in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A database file at `path`.
    #[must_use]
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::new(format!("sqlite://{}", path.as_ref().display()))
    }

    /// Sets the pool size.
    #[must_use]
    pub const fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the busy timeout.
    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets whether a missing database file is created.
    #[must_use]
    pub const fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Returns `true` for in-memory databases.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    pub(crate) fn connect_options(&self) -> Result<SqliteConnectOptions, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&self.url)?
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .create_if_missing(self.create_if_missing);
        if self.is_memory() {
            Ok(options)
        } else {
            Ok(options.journal_mode(SqliteJournalMode::Wal))
        }
    }

    pub(crate) fn pool_options(&self) -> SqlitePoolOptions {
        if self.is_memory() {
            // each connection to :memory: is its own database
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(self.max_connections.max(1))
        }
    }
}
