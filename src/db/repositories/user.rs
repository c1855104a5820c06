//! User repository
//!
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::{mysql, sqlite, DynDatabasePool};
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::placeholders;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Fetch several users in one query. Missing ids are skipped.
    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<User>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_USER: &str = "SELECT id, username, is_staff, created_at FROM users";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(sqlite(&self.pool)?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(mysql(&self.pool)?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("{} WHERE id = ?", SELECT_USER);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(sqlite(&self.pool)?)
                    .await
                    .context("Failed to get user by ID")?;
                row.as_ref().map(row_to_user_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(mysql(&self.pool)?)
                    .await
                    .context("Failed to get user by ID")?;
                row.as_ref().map(row_to_user_mysql).transpose()
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("{} WHERE username = ?", SELECT_USER);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(username)
                    .fetch_optional(sqlite(&self.pool)?)
                    .await
                    .context("Failed to get user by username")?;
                row.as_ref().map(row_to_user_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(username)
                    .fetch_optional(mysql(&self.pool)?)
                    .await
                    .context("Failed to get user by username")?;
                row.as_ref().map(row_to_user_mysql).transpose()
            }
        }
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("{} WHERE id IN ({})", SELECT_USER, placeholders(ids.len()));

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                for id in ids {
                    query = query.bind(*id);
                }
                let rows = query
                    .fetch_all(sqlite(&self.pool)?)
                    .await
                    .context("Failed to get users by IDs")?;
                rows.iter().map(row_to_user_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                for id in ids {
                    query = query.bind(*id);
                }
                let rows = query
                    .fetch_all(mysql(&self.pool)?)
                    .await
                    .context("Failed to get users by IDs")?;
                rows.iter().map(row_to_user_mysql).collect()
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let result = sqlx::query("INSERT INTO users (username, is_staff, created_at) VALUES (?, ?, ?)")
        .bind(&user.username)
        .bind(user.is_staff)
        .bind(user.created_at)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        ..user.clone()
    })
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        is_staff: row.try_get("is_staff")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let result = sqlx::query("INSERT INTO users (username, is_staff, created_at) VALUES (?, ?, ?)")
        .bind(&user.username)
        .bind(user.is_staff)
        .bind(user.created_at)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        ..user.clone()
    })
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        is_staff: row.try_get("is_staff")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::migrated_pool;

    async fn setup_test_repo() -> SqlxUserRepository {
        SqlxUserRepository::new(migrated_pool().await)
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo
            .create(&User::new("alice".to_string(), true))
            .await
            .expect("Failed to create user");
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
        assert!(by_id.is_staff);

        let by_name = repo.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let repo = setup_test_repo().await;
        assert!(repo.get_by_id(99).await.unwrap().is_none());
        assert!(repo.get_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_username_constraint() {
        let repo = setup_test_repo().await;
        repo.create(&User::new("alice".to_string(), false)).await.unwrap();
        let duplicate = repo.create(&User::new("alice".to_string(), true)).await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_get_by_ids() {
        let repo = setup_test_repo().await;
        let a = repo.create(&User::new("a".to_string(), true)).await.unwrap();
        let b = repo.create(&User::new("b".to_string(), false)).await.unwrap();

        let mut users = repo.get_by_ids(&[a.id, b.id, 404]).await.unwrap();
        users.sort_by_key(|u| u.id);
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "a");
        assert_eq!(users[1].username, "b");

        assert!(repo.get_by_ids(&[]).await.unwrap().is_empty());
    }
}
