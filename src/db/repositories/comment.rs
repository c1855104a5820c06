//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::{mysql, sqlite, DynDatabasePool};
use crate::models::{Comment, CommentWithAuthor, CreateCommentInput};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment, published now
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Comments on a post with their author's username, oldest first
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_COMMENT: &str =
    "INSERT INTO comments (post_id, author_id, text, published_at) VALUES (?, ?, ?, ?)";

const COMMENTS_FOR_POST: &str = r#"
    SELECT c.id, c.post_id, p.title AS post_title, c.author_id, u.username AS author,
           c.text, c.published_at
    FROM comments c
    JOIN users u ON u.id = c.author_id
    JOIN posts p ON p.id = c.post_id
    WHERE c.post_id = ?
    ORDER BY c.published_at ASC, c.id ASC
"#;

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        let published_at = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_COMMENT)
                .bind(input.post_id)
                .bind(input.author_id)
                .bind(&input.text)
                .bind(published_at)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to create comment")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_COMMENT)
                .bind(input.post_id)
                .bind(input.author_id)
                .bind(&input.text)
                .bind(published_at)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to create comment")?
                .last_insert_id() as i64,
        };

        Ok(Comment {
            id,
            post_id: input.post_id,
            author_id: input.author_id,
            text: input.text.clone(),
            published_at,
        })
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_for_post_sqlite(sqlite(&self.pool)?, post_id).await,
            DatabaseDriver::Mysql => list_for_post_mysql(mysql(&self.pool)?, post_id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_for_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
    let rows = sqlx::query(COMMENTS_FOR_POST)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;

    rows.iter()
        .map(|row| -> Result<CommentWithAuthor> {
            Ok(CommentWithAuthor {
                id: row.try_get("id")?,
                post_id: row.try_get("post_id")?,
                post_title: row.try_get("post_title")?,
                author_id: row.try_get("author_id")?,
                author: row.try_get("author")?,
                text: row.try_get("text")?,
                published_at: row.try_get("published_at")?,
            })
        })
        .collect()
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_for_post_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
    let rows = sqlx::query(COMMENTS_FOR_POST)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;

    rows.iter()
        .map(|row| -> Result<CommentWithAuthor> {
            Ok(CommentWithAuthor {
                id: row.try_get("id")?,
                post_id: row.try_get("post_id")?,
                post_title: row.try_get("post_title")?,
                author_id: row.try_get("author_id")?,
                author: row.try_get("author")?,
                text: row.try_get("text")?,
                published_at: row.try_get("published_at")?,
            })
        })
        .collect()
}
