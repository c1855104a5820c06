//! Post repository
//!
//! Database operations for posts, their likes and the aggregate counts shown
//! on listing pages.
//!
//! - `PostRepository` trait defining the interface for post data access
//! - `SqlxPostRepository` implementing the trait for SQLite and MySQL
//!
//! Popular listings are built in two phases: `rank_by_likes` orders posts by
//! like count, then `attach_comment_counts` fills `comments_amount` for the
//! ranked posts with a single bulk query. Each phase annotates its own field.

use crate::config::DatabaseDriver;
use crate::db::{mysql, sqlite, DynDatabasePool};
use crate::models::Post;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

use super::placeholders;

/// Failure while attaching comment counts to already-loaded posts
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BackfillError {
    /// The count query returned no row for a post that was asked for,
    /// typically because the post was deleted between the two phases.
    #[error("no comment count returned for post {post_id}")]
    MissingPost { post_id: i64 },
}

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert the stored columns of a post. Annotations are ignored.
    async fn create(&self, post: &Post) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Slug lookup, annotated with `likes_amount`
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    /// Posts ordered by descending like count, annotated with `likes_amount`.
    ///
    /// Equal counts fall back to newest first.
    async fn rank_by_likes(&self, limit: usize) -> Result<Vec<Post>>;

    /// Newest posts, annotated with `comments_amount`
    async fn list_recent(&self, limit: usize) -> Result<Vec<Post>>;

    /// All posts carrying the tag, newest first, annotated with `comments_amount`
    async fn list_by_tag(&self, tag_id: i64) -> Result<Vec<Post>>;

    /// Posts published in the given calendar year (UTC), oldest first
    async fn list_by_year(&self, year: i32) -> Result<Vec<Post>>;

    /// Comment count per post id, in one query.
    ///
    /// Every existing post among `post_ids` gets an entry, zero included.
    async fn comment_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>>;

    /// Fill `comments_amount` on each post from one `comment_counts` call.
    ///
    /// Fails with [`BackfillError::MissingPost`] if a post has no count
    /// instead of assuming zero. An empty slice issues no query.
    async fn attach_comment_counts(&self, posts: &mut [Post]) -> Result<()> {
        if posts.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let counts = self.comment_counts(&ids).await?;

        for post in posts.iter_mut() {
            let count = counts
                .get(&post.id)
                .copied()
                .ok_or(BackfillError::MissingPost { post_id: post.id })?;
            post.comments_amount = Some(count);
        }

        Ok(())
    }

    /// Record a like. Liking twice is a no-op.
    async fn add_like(&self, post_id: i64, user_id: i64) -> Result<()>;

    async fn remove_like(&self, post_id: i64, user_id: i64) -> Result<()>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }

    /// Run a post query whose only parameters are integers
    async fn fetch_posts(&self, sql: &str, args: &[i64]) -> Result<Vec<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_posts_sqlite(sqlite(&self.pool)?, sql, args).await,
            DatabaseDriver::Mysql => fetch_posts_mysql(mysql(&self.pool)?, sql, args).await,
        }
    }
}

const POST_COLUMNS: &str = "p.id, p.title, p.text, p.slug, p.image, p.published_at, p.author_id";

const LIKES_AMOUNT: &str =
    "(SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS likes_amount";

const COMMENTS_AMOUNT: &str =
    "(SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_amount";

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(sqlite(&self.pool)?, post).await,
            DatabaseDriver::Mysql => create_post_mysql(mysql(&self.pool)?, post).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts p WHERE p.id = ?", POST_COLUMNS);
        let posts = self
            .fetch_posts(&sql, &[id])
            .await
            .context("Failed to get post by ID")?;
        Ok(posts.into_iter().next())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let sql = format!(
            "SELECT {}, {} FROM posts p WHERE p.slug = ?",
            POST_COLUMNS, LIKES_AMOUNT
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(sqlite(&self.pool)?)
                    .await
                    .context("Failed to get post by slug")?;
                row.as_ref().map(row_to_post_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(mysql(&self.pool)?)
                    .await
                    .context("Failed to get post by slug")?;
                row.as_ref().map(row_to_post_mysql).transpose()
            }
        }
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) AS count FROM posts WHERE slug = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(slug)
                .fetch_one(sqlite(&self.pool)?)
                .await
                .context("Failed to check slug")?
                .try_get("count")?,
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(slug)
                .fetch_one(mysql(&self.pool)?)
                .await
                .context("Failed to check slug")?
                .try_get("count")?,
        };
        Ok(count > 0)
    }

    async fn rank_by_likes(&self, limit: usize) -> Result<Vec<Post>> {
        let sql = format!(
            r#"
            SELECT {}, COUNT(pl.user_id) AS likes_amount
            FROM posts p
            LEFT JOIN post_likes pl ON pl.post_id = p.id
            GROUP BY p.id
            ORDER BY likes_amount DESC, p.published_at DESC
            LIMIT ?
            "#,
            POST_COLUMNS
        );
        self.fetch_posts(&sql, &[limit as i64])
            .await
            .context("Failed to rank posts by likes")
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {}, {} FROM posts p ORDER BY p.published_at DESC LIMIT ?",
            POST_COLUMNS, COMMENTS_AMOUNT
        );
        self.fetch_posts(&sql, &[limit as i64])
            .await
            .context("Failed to list recent posts")
    }

    async fn list_by_tag(&self, tag_id: i64) -> Result<Vec<Post>> {
        let sql = format!(
            r#"
            SELECT {}, {}
            FROM posts p
            JOIN post_tags pt ON pt.post_id = p.id
            WHERE pt.tag_id = ?
            ORDER BY p.published_at DESC
            "#,
            POST_COLUMNS, COMMENTS_AMOUNT
        );
        self.fetch_posts(&sql, &[tag_id])
            .await
            .context("Failed to list posts by tag")
    }

    async fn list_by_year(&self, year: i32) -> Result<Vec<Post>> {
        let start = Utc
            .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| anyhow!("Year out of range: {}", year))?;
        let end = Utc
            .with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| anyhow!("Year out of range: {}", year))?;

        let sql = format!(
            r#"
            SELECT {} FROM posts p
            WHERE p.published_at >= ? AND p.published_at < ?
            ORDER BY p.published_at ASC
            "#,
            POST_COLUMNS
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(start)
                    .bind(end)
                    .fetch_all(sqlite(&self.pool)?)
                    .await
                    .context("Failed to list posts by year")?;
                rows.iter().map(row_to_post_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(start)
                    .bind(end)
                    .fetch_all(mysql(&self.pool)?)
                    .await
                    .context("Failed to list posts by year")?;
                rows.iter().map(row_to_post_mysql).collect()
            }
        }
    }

    async fn comment_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            r#"
            SELECT p.id, COUNT(c.id) AS comments_amount
            FROM posts p
            LEFT JOIN comments c ON c.post_id = p.id
            WHERE p.id IN ({})
            GROUP BY p.id
            "#,
            placeholders(post_ids.len())
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                for id in post_ids {
                    query = query.bind(*id);
                }
                let rows = query
                    .fetch_all(sqlite(&self.pool)?)
                    .await
                    .context("Failed to count comments")?;
                rows.iter()
                    .map(|row| -> Result<(i64, i64)> {
                        Ok((row.try_get("id")?, row.try_get("comments_amount")?))
                    })
                    .collect()
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                for id in post_ids {
                    query = query.bind(*id);
                }
                let rows = query
                    .fetch_all(mysql(&self.pool)?)
                    .await
                    .context("Failed to count comments")?;
                rows.iter()
                    .map(|row| -> Result<(i64, i64)> {
                        Ok((row.try_get("id")?, row.try_get("comments_amount")?))
                    })
                    .collect()
            }
        }
    }

    async fn add_like(&self, post_id: i64, user_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("INSERT OR IGNORE INTO post_likes (post_id, user_id) VALUES (?, ?)")
                    .bind(post_id)
                    .bind(user_id)
                    .execute(sqlite(&self.pool)?)
                    .await
                    .context("Failed to like post")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("INSERT IGNORE INTO post_likes (post_id, user_id) VALUES (?, ?)")
                    .bind(post_id)
                    .bind(user_id)
                    .execute(mysql(&self.pool)?)
                    .await
                    .context("Failed to like post")?;
            }
        }
        Ok(())
    }

    async fn remove_like(&self, post_id: i64, user_id: i64) -> Result<()> {
        let sql = "DELETE FROM post_likes WHERE post_id = ? AND user_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(post_id)
                    .bind(user_id)
                    .execute(sqlite(&self.pool)?)
                    .await
                    .context("Failed to remove like")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(post_id)
                    .bind(user_id)
                    .execute(mysql(&self.pool)?)
                    .await
                    .context("Failed to remove like")?;
            }
        }
        Ok(())
    }
}

const INSERT_POST: &str = r#"
    INSERT INTO posts (title, text, slug, image, published_at, author_id)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    let result = sqlx::query(INSERT_POST)
        .bind(&post.title)
        .bind(&post.text)
        .bind(&post.slug)
        .bind(&post.image)
        .bind(post.published_at)
        .bind(post.author_id)
        .execute(pool)
        .await
        .context("Failed to create post")?;

    Ok(stored_post(post, result.last_insert_rowid()))
}

async fn fetch_posts_sqlite(pool: &SqlitePool, sql: &str, args: &[i64]) -> Result<Vec<Post>> {
    let mut query = sqlx::query(sql);
    for arg in args {
        query = query.bind(*arg);
    }
    let rows = query.fetch_all(pool).await?;
    rows.iter().map(row_to_post_sqlite).collect()
}

/// Annotation columns are read only when the query selected them
fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        text: row.try_get("text")?,
        slug: row.try_get("slug")?,
        image: row.try_get("image")?,
        published_at: row.try_get("published_at")?,
        author_id: row.try_get("author_id")?,
        author: None,
        tags: None,
        likes_amount: row.try_get("likes_amount").ok(),
        comments_amount: row.try_get("comments_amount").ok(),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &Post) -> Result<Post> {
    let result = sqlx::query(INSERT_POST)
        .bind(&post.title)
        .bind(&post.text)
        .bind(&post.slug)
        .bind(&post.image)
        .bind(post.published_at)
        .bind(post.author_id)
        .execute(pool)
        .await
        .context("Failed to create post")?;

    Ok(stored_post(post, result.last_insert_id() as i64))
}

async fn fetch_posts_mysql(pool: &MySqlPool, sql: &str, args: &[i64]) -> Result<Vec<Post>> {
    let mut query = sqlx::query(sql);
    for arg in args {
        query = query.bind(*arg);
    }
    let rows = query.fetch_all(pool).await?;
    rows.iter().map(row_to_post_mysql).collect()
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        text: row.try_get("text")?,
        slug: row.try_get("slug")?,
        image: row.try_get("image")?,
        published_at: row.try_get("published_at")?,
        author_id: row.try_get("author_id")?,
        author: None,
        tags: None,
        likes_amount: row.try_get("likes_amount").ok(),
        comments_amount: row.try_get("comments_amount").ok(),
    })
}

/// The inserted post with its new id and no annotations
fn stored_post(post: &Post, id: i64) -> Post {
    Post {
        id,
        author: None,
        tags: None,
        likes_amount: None,
        comments_amount: None,
        ..post.clone()
    }
}
