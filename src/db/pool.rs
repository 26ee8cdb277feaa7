//! Database connection pooling
//!
//! One interface over the two supported backends: SQLite for single-binary
//! deployments and MySQL for larger installs. Repositories dispatch on
//! `driver()` and reach the concrete pool through `as_sqlite`/`as_mysql`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

/// Backend-agnostic connection pool.
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Run a statement that returns no rows; yields the affected row count
    async fn execute(&self, query: &str) -> Result<u64>;

    /// Verify the connection is alive
    async fn ping(&self) -> Result<()>;

    /// Close all pooled connections
    async fn close(&self);

    /// Which backend this pool talks to
    fn driver(&self) -> DatabaseDriver;

    /// The concrete SQLite pool, when this is one
    fn as_sqlite(&self) -> Option<&SqlitePool>;

    /// The concrete MySQL pool, when this is one
    fn as_mysql(&self) -> Option<&MySqlPool>;
}

/// SQLite-backed pool
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Create a new SQLite connection pool.
    ///
    /// For file-based databases the parent directory is created if missing
    /// and the database file is created on first connect.
    pub async fn new(url: &str) -> Result<Self> {
        if !url.starts_with(":memory:") && !url.starts_with("sqlite::memory:") {
            let path = url.strip_prefix("sqlite:").unwrap_or(url);
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory: {:?}", parent)
                    })?;
                }
            }
        }

        let connection_url = if url.starts_with("sqlite:") {
            if url.contains('?') {
                url.to_string()
            } else {
                format!("{}?mode=rwc", url)
            }
        } else if url == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", url)
        };

        // Sessions reference users and cars; enforce it on every connection
        let options = SqliteConnectOptions::from_str(&connection_url)
            .with_context(|| format!("Invalid SQLite URL: {}", url))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to SQLite database: {}", url))?;

        Ok(Self { pool })
    }

    /// Direct access to the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute statement: {}", query))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database ping did not return")?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Sqlite
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        Some(&self.pool)
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        None
    }
}

/// MySQL-backed pool
pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    /// Create a new MySQL connection pool; a bare `user:pass@host/db` URL
    /// gets the scheme prepended.
    pub async fn new(url: &str) -> Result<Self> {
        let connection_url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(20)
            .connect(&connection_url)
            .await
            .with_context(|| format!("Failed to connect to MySQL database: {}", url))?;

        Ok(Self { pool })
    }

    /// Direct access to the underlying pool
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for MysqlDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute statement: {}", query))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database ping did not return")?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Mysql
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        None
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        Some(&self.pool)
    }
}

/// Shared handle to whichever pool the configuration selected
pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Open the configured database and return a shared pool handle.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    match config.driver {
        DatabaseDriver::Sqlite => {
            let db = SqliteDatabase::new(&config.url).await?;
            Ok(Arc::new(db))
        }
        DatabaseDriver::Mysql => {
            let db = MysqlDatabase::new(&config.url).await?;
            Ok(Arc::new(db))
        }
    }
}

/// Monotonic counter giving each test pool a distinct shared-cache database
/// name, so pools created by tests running in parallel stay isolated.
static TEST_DB_SEQ: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Create a SQLite in-memory database pool for testing.
///
/// Backed by a *named* shared-cache in-memory database rather than an anonymous
/// `:memory:` one: a plain `:memory:` database is private to a single
/// connection, whereas shared-cache lets every connection in the pool see the
/// same tables. A per-pool unique name keeps concurrent tests isolated, and the
/// database lives as long as at least one connection stays open.
///
/// Several connections are pre-opened so there is always an idle one to hand
/// out. This matters under `#[tokio::test(start_paused = true)]`: with a single
/// connection, the moment it is mid-release the next acquire has to wait, and
/// the current-thread runtime auto-advances virtual time straight to the pool's
/// acquire-timeout timer, starving the acquire. Pre-warming the connections on a
/// dedicated, non-paused runtime (so no connection is ever opened on the paused
/// clock) and disabling idle/lifetime reaping keeps every acquire synchronous
/// however far a test advances the clock.
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    let seq = TEST_DB_SEQ.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let url = format!("sqlite:file:parkping_test_{seq}?mode=memory&cache=shared");
    let options = SqliteConnectOptions::from_str(&url)
        .context("Invalid in-memory SQLite URL")?
        .foreign_keys(true);

    let pool = std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build setup runtime for test pool")?;
        rt.block_on(async {
            SqlitePoolOptions::new()
                .max_connections(8)
                .min_connections(8)
                .idle_timeout(None)
                .max_lifetime(None)
                .test_before_acquire(false)
                .connect_with(options)
                .await
                .context("Failed to create in-memory SQLite pool")
        })
    })
    .join()
    .map_err(|_| anyhow::anyhow!("test pool setup thread panicked"))??;

    Ok(Arc::new(SqliteDatabase { pool }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool_is_sqlite() {
        let pool = create_test_pool().await.expect("test pool");
        assert_eq!(pool.driver(), DatabaseDriver::Sqlite);
        assert!(pool.as_sqlite().is_some());
        assert!(pool.as_mysql().is_none());
        pool.ping().await.expect("ping");
    }

    #[tokio::test]
    async fn test_execute_reports_affected_rows() {
        let pool = create_test_pool().await.expect("test pool");

        pool.execute("CREATE TABLE scratch (id INTEGER PRIMARY KEY, note TEXT)")
            .await
            .expect("create table");

        let affected = pool
            .execute("INSERT INTO scratch (note) VALUES ('hello')")
            .await
            .expect("insert");
        assert_eq!(affected, 1);
    }

    #[tokio::test]
    async fn test_file_pool_creates_parent_directories() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let db_path = temp_dir.path().join("nested").join("parkping.db");

        let config = DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: db_path.to_string_lossy().to_string(),
        };

        let pool = create_pool(&config).await.expect("pool");
        pool.ping().await.expect("ping");

        assert!(db_path.exists());
    }

    // Needs a reachable server; point MYSQL_TEST_URL at one to run.
    #[tokio::test]
    #[ignore = "Requires MySQL server"]
    async fn test_mysql_pool_connects() {
        let url = std::env::var("MYSQL_TEST_URL")
            .unwrap_or_else(|_| "mysql://root@localhost/test".to_string());

        let config = DatabaseConfig {
            driver: DatabaseDriver::Mysql,
            url,
        };

        let pool = create_pool(&config).await.expect("pool");
        assert_eq!(pool.driver(), DatabaseDriver::Mysql);
        pool.ping().await.expect("ping");
    }
}
