//! Database layer
//!
//! SQLite (default) and MySQL behind the `DatabasePool` trait. The backend is
//! selected by `database.driver` in the configuration.
//!
//! ```ignore
//! use blogfront::config::DatabaseConfig;
//! use blogfront::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

use anyhow::{anyhow, Result};
use sqlx::{MySqlPool, SqlitePool};

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Borrow the SQLite pool, failing if the handle is backed by another driver.
pub(crate) fn sqlite(pool: &DynDatabasePool) -> Result<&SqlitePool> {
    pool.as_sqlite()
        .ok_or_else(|| anyhow!("database handle is not backed by SQLite"))
}

/// Borrow the MySQL pool, failing if the handle is backed by another driver.
pub(crate) fn mysql(pool: &DynDatabasePool) -> Result<&MySqlPool> {
    pool.as_mysql()
        .ok_or_else(|| anyhow!("database handle is not backed by MySQL"))
}
