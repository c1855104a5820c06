//! Tag repository
//!
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL
//!
//! Queries that return tags for display annotate `posts_amount`, the number
//! of posts carrying each tag.

use crate::config::DatabaseDriver;
use crate::db::{mysql, sqlite, DynDatabasePool};
use crate::models::Tag;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::placeholders;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Insert a tag. The title is stored as given.
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Exact title lookup, annotated with `posts_amount`
    async fn get_by_title(&self, title: &str) -> Result<Option<Tag>>;

    /// Tags ordered by descending post count, ties by title
    async fn popular(&self, limit: usize) -> Result<Vec<Tag>>;

    /// `(post_id, tag)` pairs for the given posts, annotated, title ascending
    async fn get_for_posts(&self, post_ids: &[i64]) -> Result<Vec<(i64, Tag)>>;

    /// Attach a tag to a post; attaching twice is a no-op
    async fn add_to_post(&self, tag_id: i64, post_id: i64) -> Result<()>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

const POSTS_AMOUNT: &str =
    "(SELECT COUNT(*) FROM post_tags c WHERE c.tag_id = t.id) AS posts_amount";

const POPULAR_TAGS: &str = r#"
    SELECT t.id, t.title, COUNT(pt.post_id) AS posts_amount
    FROM tags t
    LEFT JOIN post_tags pt ON pt.tag_id = t.id
    GROUP BY t.id, t.title
    ORDER BY posts_amount DESC, t.title ASC
    LIMIT ?
"#;

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_tag_sqlite(sqlite(&self.pool)?, tag).await,
            DatabaseDriver::Mysql => create_tag_mysql(mysql(&self.pool)?, tag).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        let sql = "SELECT id, title FROM tags WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(sqlite(&self.pool)?)
                    .await
                    .context("Failed to get tag by ID")?;
                row.as_ref().map(row_to_tag_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(mysql(&self.pool)?)
                    .await
                    .context("Failed to get tag by ID")?;
                row.as_ref().map(row_to_tag_mysql).transpose()
            }
        }
    }

    async fn get_by_title(&self, title: &str) -> Result<Option<Tag>> {
        let sql = format!("SELECT t.id, t.title, {} FROM tags t WHERE t.title = ?", POSTS_AMOUNT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(title)
                    .fetch_optional(sqlite(&self.pool)?)
                    .await
                    .context("Failed to get tag by title")?;
                row.as_ref().map(row_to_tag_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(title)
                    .fetch_optional(mysql(&self.pool)?)
                    .await
                    .context("Failed to get tag by title")?;
                row.as_ref().map(row_to_tag_mysql).transpose()
            }
        }
    }

    async fn popular(&self, limit: usize) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(POPULAR_TAGS)
                    .bind(limit as i64)
                    .fetch_all(sqlite(&self.pool)?)
                    .await
                    .context("Failed to get popular tags")?;
                rows.iter().map(row_to_tag_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(POPULAR_TAGS)
                    .bind(limit as i64)
                    .fetch_all(mysql(&self.pool)?)
                    .await
                    .context("Failed to get popular tags")?;
                rows.iter().map(row_to_tag_mysql).collect()
            }
        }
    }

    async fn get_for_posts(&self, post_ids: &[i64]) -> Result<Vec<(i64, Tag)>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT pt.post_id, t.id, t.title, {}
            FROM post_tags pt
            JOIN tags t ON t.id = pt.tag_id
            WHERE pt.post_id IN ({})
            ORDER BY t.title ASC
            "#,
            POSTS_AMOUNT,
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
                    .context("Failed to get tags for posts")?;
                rows.iter()
                    .map(|row| -> Result<(i64, Tag)> {
                        Ok((row.try_get("post_id")?, row_to_tag_sqlite(row)?))
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
                    .context("Failed to get tags for posts")?;
                rows.iter()
                    .map(|row| -> Result<(i64, Tag)> {
                        Ok((row.try_get("post_id")?, row_to_tag_mysql(row)?))
                    })
                    .collect()
            }
        }
    }

    async fn add_to_post(&self, tag_id: i64, post_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                    .bind(post_id)
                    .bind(tag_id)
                    .execute(sqlite(&self.pool)?)
                    .await
                    .context("Failed to add tag to post")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("INSERT IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                    .bind(post_id)
                    .bind(tag_id)
                    .execute(mysql(&self.pool)?)
                    .await
                    .context("Failed to add tag to post")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tag_sqlite(pool: &SqlitePool, tag: &Tag) -> Result<Tag> {
    let result = sqlx::query("INSERT INTO tags (title) VALUES (?)")
        .bind(&tag.title)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        title: tag.title.clone(),
        posts_amount: None,
    })
}

/// `posts_amount` is read only when the query selected it
fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        posts_amount: row.try_get("posts_amount").ok(),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_tag_mysql(pool: &MySqlPool, tag: &Tag) -> Result<Tag> {
    let result = sqlx::query("INSERT INTO tags (title) VALUES (?)")
        .bind(&tag.title)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_id() as i64,
        title: tag.title.clone(),
        posts_amount: None,
    })
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        posts_amount: row.try_get("posts_amount").ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::*;
    use proptest::prelude::*;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxTagRepository) {
        let pool = migrated_pool().await;
        let repo = SqlxTagRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_tag() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo.create(&Tag::new("rust")).await.expect("Failed to create tag");
        assert!(created.id > 0);
        assert_eq!(created.title, "rust");

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "rust");
        assert_eq!(fetched.posts_amount, None);
    }

    #[tokio::test]
    async fn test_unique_title_constraint() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&Tag::new("rust")).await.unwrap();
        assert!(repo.create(&Tag::new("rust")).await.is_err());
    }

    #[tokio::test]
    async fn test_get_by_title_is_annotated() {
        let (pool, repo) = setup_test_repo().await;
        let db = pool.as_sqlite().unwrap();

        let author = insert_user(db, "alice", true).await;
        let tag = insert_tag(db, "python").await;
        for (i, slug) in ["a", "b"].iter().enumerate() {
            let post = insert_post(db, author, slug, day(i as u32 + 1)).await;
            tag_post(db, post, tag).await;
        }

        let found = repo.get_by_title("python").await.unwrap().unwrap();
        assert_eq!(found.id, tag);
        assert_eq!(found.posts_amount, Some(2));

        assert!(repo.get_by_title("Python").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_popular_orders_by_post_count() {
        let (pool, repo) = setup_test_repo().await;
        let db = pool.as_sqlite().unwrap();

        let author = insert_user(db, "alice", true).await;
        let rare = insert_tag(db, "rare").await;
        let common = insert_tag(db, "common").await;
        let unused = insert_tag(db, "unused").await;

        for i in 0..3 {
            let post = insert_post(db, author, &format!("p{}", i), day(i + 1)).await;
            tag_post(db, post, common).await;
            if i == 0 {
                tag_post(db, post, rare).await;
            }
        }

        let popular = repo.popular(5).await.unwrap();
        let ids: Vec<i64> = popular.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![common, rare, unused]);
        assert_eq!(popular[0].posts_amount, Some(3));
        assert_eq!(popular[2].posts_amount, Some(0));

        assert_eq!(repo.popular(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_for_posts() {
        let (pool, repo) = setup_test_repo().await;
        let db = pool.as_sqlite().unwrap();

        let author = insert_user(db, "alice", true).await;
        let web = insert_tag(db, "web").await;
        let django = insert_tag(db, "django").await;
        let first = insert_post(db, author, "first", day(1)).await;
        let second = insert_post(db, author, "second", day(2)).await;
        let untouched = insert_post(db, author, "third", day(3)).await;
        tag_post(db, first, web).await;
        tag_post(db, first, django).await;
        tag_post(db, second, web).await;
        tag_post(db, untouched, web).await;

        let pairs = repo.get_for_posts(&[first, second]).await.unwrap();
        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().all(|(post_id, _)| *post_id != untouched));

        let first_titles: Vec<&str> = pairs
            .iter()
            .filter(|(post_id, _)| *post_id == first)
            .map(|(_, tag)| tag.title.as_str())
            .collect();
        assert_eq!(first_titles, vec!["django", "web"]);

        let web_count = pairs.iter().find(|(_, t)| t.id == web).unwrap().1.posts_amount;
        assert_eq!(web_count, Some(3));

        assert!(repo.get_for_posts(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_to_post_is_idempotent() {
        let (pool, repo) = setup_test_repo().await;
        let db = pool.as_sqlite().unwrap();

        let author = insert_user(db, "alice", true).await;
        let post = insert_post(db, author, "post", day(1)).await;
        let tag = repo.create(&Tag::new("rust")).await.unwrap();

        repo.add_to_post(tag.id, post).await.unwrap();
        // Second add is ignored
        repo.add_to_post(tag.id, post).await.unwrap();
        assert_eq!(repo.get_for_posts(&[post]).await.unwrap().len(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_popular_is_non_increasing(usage in proptest::collection::vec(0usize..4, 1..6)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let (pool, repo) = setup_test_repo().await;
                let db = pool.as_sqlite().unwrap();
                let author = insert_user(db, "alice", true).await;

                let mut posts = Vec::new();
                for i in 0..4u32 {
                    posts.push(insert_post(db, author, &format!("p{}", i), day(i + 1)).await);
                }
                for (i, count) in usage.iter().enumerate() {
                    let tag = insert_tag(db, &format!("tag{}", i)).await;
                    for post in posts.iter().take(*count) {
                        tag_post(db, *post, tag).await;
                    }
                }

                let popular = repo.popular(usage.len()).await.unwrap();
                assert_eq!(popular.len(), usage.len());
                for pair in popular.windows(2) {
                    assert!(pair[0].posts_amount >= pair[1].posts_amount);
                }
            });
        }
    }
}
