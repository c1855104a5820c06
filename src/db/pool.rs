//! Connection pools
//!
//! [`DatabasePool`] hides which backend a deployment runs on. Repositories
//! look at [`DatabasePool::driver`] and borrow the concrete sqlx pool.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

const SQLITE_FILE_CONNECTIONS: u32 = 8;
const MYSQL_CONNECTIONS: u32 = 16;

#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Round-trip a trivial query
    async fn ping(&self) -> Result<()>;

    async fn close(&self);

    fn driver(&self) -> DatabaseDriver;

    fn as_sqlite(&self) -> Option<&SqlitePool>;

    fn as_mysql(&self) -> Option<&MySqlPool>;
}

pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Where a configured SQLite URL points
#[derive(Debug, PartialEq, Eq)]
enum SqliteTarget {
    /// Private database that lives as long as its single connection
    Memory,
    /// Database file, created on first connect unless the URL says otherwise
    File { path: PathBuf, url: String },
}

impl SqliteTarget {
    fn parse(url: &str) -> Self {
        if url == ":memory:" || url.starts_with("sqlite::memory:") {
            return SqliteTarget::Memory;
        }

        let location = url.strip_prefix("sqlite:").unwrap_or(url);
        let (path, query) = match location.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (location, None),
        };

        SqliteTarget::File {
            path: PathBuf::from(path),
            url: format!("sqlite:{}?{}", path, query.unwrap_or("mode=rwc")),
        }
    }
}

pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = match SqliteTarget::parse(url) {
            // Every in-memory connection is a separate database, so the pool
            // must keep exactly one connection open for its whole life.
            SqliteTarget::Memory => SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(sqlite_options("sqlite::memory:")?)
                .await
                .context("Failed to open in-memory SQLite database")?,
            SqliteTarget::File { path, url: sqlx_url } => {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir)
                        .with_context(|| format!("Failed to create database directory {:?}", dir))?;
                }
                SqlitePoolOptions::new()
                    .max_connections(SQLITE_FILE_CONNECTIONS)
                    .connect_with(sqlite_options(&sqlx_url)?)
                    .await
                    .with_context(|| format!("Failed to open SQLite database {:?}", path))?
            }
        };

        Ok(Self { pool })
    }
}

/// The cascade on post deletion relies on foreign keys being enforced on
/// every connection.
fn sqlite_options(url: &str) -> Result<SqliteConnectOptions> {
    Ok(SqliteConnectOptions::from_str(url)
        .with_context(|| format!("Invalid SQLite URL {:?}", url))?
        .foreign_keys(true))
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .context("SQLite ping failed")
    }

    async fn close(&self) {
        self.pool.close().await
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

pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    pub async fn connect(url: &str) -> Result<Self> {
        let url = match url.strip_prefix("mysql://") {
            Some(_) => url.to_string(),
            None => format!("mysql://{}", url),
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(MYSQL_CONNECTIONS)
            .connect(&url)
            .await
            .context("Failed to connect to MySQL")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabasePool for MysqlDatabase {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .context("MySQL ping failed")
    }

    async fn close(&self) {
        self.pool.close().await
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

/// Open the pool for the configured driver
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let pool: DynDatabasePool = match config.driver {
        DatabaseDriver::Sqlite => Arc::new(SqliteDatabase::connect(&config.url).await?),
        DatabaseDriver::Mysql => Arc::new(MysqlDatabase::connect(&config.url).await?),
    };
    Ok(pool)
}

/// Fresh in-memory SQLite database
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    Ok(Arc::new(SqliteDatabase::connect(":memory:").await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_target_parse() {
        assert_eq!(SqliteTarget::parse(":memory:"), SqliteTarget::Memory);
        assert_eq!(SqliteTarget::parse("sqlite::memory:"), SqliteTarget::Memory);
        assert_eq!(
            SqliteTarget::parse("data/blog.db"),
            SqliteTarget::File {
                path: PathBuf::from("data/blog.db"),
                url: "sqlite:data/blog.db?mode=rwc".to_string(),
            }
        );
        assert_eq!(
            SqliteTarget::parse("sqlite:blog.db?mode=ro"),
            SqliteTarget::File {
                path: PathBuf::from("blog.db"),
                url: "sqlite:blog.db?mode=ro".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_memory_pool_keeps_schema_across_queries() {
        let pool = create_test_pool().await.unwrap();
        assert_eq!(pool.driver(), DatabaseDriver::Sqlite);
        assert!(pool.as_mysql().is_none());

        let db = pool.as_sqlite().unwrap();
        sqlx::query("CREATE TABLE t (id INTEGER)").execute(db).await.unwrap();
        for _ in 0..3 {
            sqlx::query("INSERT INTO t (id) VALUES (1)").execute(db).await.unwrap();
        }
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t")
            .fetch_one(db)
            .await
            .unwrap();
        assert_eq!(count, 3);
        pool.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_pool_creates_parent_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("blog.db");

        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: db_path.to_string_lossy().to_string(),
        })
        .await
        .unwrap();

        pool.ping().await.unwrap();
        assert!(db_path.exists());
        pool.close().await;
    }

    #[tokio::test]
    #[ignore = "Requires MySQL server"]
    async fn test_mysql_pool_ping() {
        let url = std::env::var("MYSQL_TEST_URL")
            .unwrap_or_else(|_| "mysql://root@localhost/test".to_string());

        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Mysql,
            url,
        })
        .await
        .unwrap();
        assert_eq!(pool.driver(), DatabaseDriver::Mysql);
        pool.ping().await.unwrap();
    }
}
