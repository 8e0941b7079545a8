//! Database configuration and connection.

use std::str::FromStr;
use std::time::Duration;

use oxide_migrate::prelude::{MigrationRunner, RunReport, SqliteDialect};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::content_type::ContentTypeKind;
use crate::error::Result;
use crate::locks::TypeLocks;
use crate::migrations;
use crate::service::ContentTypeService;
use crate::unit_of_work::UnitOfWork;

/// URL of a private in-memory database.
pub const IN_MEMORY_URL: &str = "sqlite::memory:";

/// Database configuration.
///
/// ```rust,ignore
/// let db = DatabaseConfig::new("sqlite:cms.sqlite3")
///     .max_connections(5)
///     .connect()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite URL or file path.
    pub url: String,
    /// Maximum number of pooled connections. Default: 5.
    pub max_connections: u32,
    /// How long to wait for a connection. Default: 30 seconds.
    pub connect_timeout: Duration,
    /// Whether to apply pending migrations on connect. Default: true.
    pub run_migrations: bool,
}

impl DatabaseConfig {
    /// Creates a configuration for the database at `url`. The file is created
    /// if missing.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }

    /// An isolated in-memory database (for testing).
    ///
    /// Limited to one connection: every connection would otherwise see its
    /// own empty database.
    pub fn in_memory() -> Self {
        Self {
            url: IN_MEMORY_URL.to_string(),
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Returns true for in-memory databases.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// Connection options with foreign keys enforced.
    pub fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(&self.url)?
            .foreign_keys(true)
            .create_if_missing(true);
        if self.is_in_memory() {
            Ok(options)
        } else {
            Ok(options.journal_mode(SqliteJournalMode::Wal))
        }
    }

    /// Opens the pool and, if enabled, brings the schema up to date.
    ///
    /// A failed migration fails the whole call; the database is left at the
    /// last step that applied.
    pub async fn connect(&self) -> Result<Database> {
        info!(url = %self.url, "Opening database");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout);
        if self.is_in_memory() {
            // Closing the last connection would discard the database.
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(self.connect_options()?).await?;
        debug!(max_connections = self.max_connections, "Database pool created");

        let db = Database::new(pool);
        if self.run_migrations {
            db.migrate().await?;
        }
        Ok(db)
    }
}

/// Handle over the connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    locks: TypeLocks,
}

impl Database {
    /// Wraps an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: TypeLocks::new(),
        }
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A migration runner for the built-in plan.
    #[must_use]
    pub fn runner(&self) -> MigrationRunner<SqliteDialect> {
        MigrationRunner::new(self.pool.clone(), SqliteDialect::new())
    }

    /// Applies every pending step of the built-in plan.
    pub async fn migrate(&self) -> Result<RunReport> {
        let plan = migrations::plan()?;
        let report = self.runner().run(&plan).await?;
        info!(
            applied = report.applied().len(),
            skipped = report.skipped().len(),
            "Schema up to date"
        );
        Ok(report)
    }

    /// A new unit of work.
    #[must_use]
    pub fn unit_of_work(&self) -> UnitOfWork {
        UnitOfWork::new(self.pool.clone())
    }

    /// The content type service for `kind`. Services share this database's
    /// locks.
    #[must_use]
    pub fn content_types(&self, kind: ContentTypeKind) -> ContentTypeService {
        ContentTypeService::new(self.pool.clone(), kind, self.locks.clone())
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DatabaseConfig::new("sqlite:cms.sqlite3");
        assert_eq!(config.max_connections, 5);
        assert!(config.run_migrations);
        assert!(!config.is_in_memory());

        let memory = DatabaseConfig::in_memory().run_migrations(false);
        assert_eq!(memory.max_connections, 1);
        assert!(memory.is_in_memory());
        assert!(!memory.run_migrations);
    }

    #[tokio::test]
    async fn test_connect_runs_migrations() {
        let db = DatabaseConfig::in_memory().connect().await.unwrap();
        let count = db
            .runner()
            .ledger()
            .count(migrations::PRODUCT)
            .await
            .unwrap();
        assert_eq!(count, 5);

        // A second run finds nothing to do.
        let report = db.migrate().await.unwrap();
        assert!(report.applied().is_empty());
    }

    #[tokio::test]
    async fn test_connect_without_migrations() {
        let db = DatabaseConfig::in_memory()
            .run_migrations(false)
            .connect()
            .await
            .unwrap();
        let (tables,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(tables, 0);
    }
}
