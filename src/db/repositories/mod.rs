//! Database repositories
//!
//! One repository per entity. Aggregate annotations (like, comment and post
//! counts) are computed here and attached to the returned models.

pub mod comment;
pub mod post;
pub mod tag;
pub mod user;

pub use comment::{CommentRepository, SqlxCommentRepository};
pub use post::{BackfillError, PostRepository, SqlxPostRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// `?, ?, ?` for an `IN (...)` clause with `n` bound values
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by repository and service tests

    use chrono::{DateTime, TimeZone, Utc};
    use sqlx::SqlitePool;

    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    pub async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    /// Fixed timestamp `day` days into 2024
    pub fn day(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    pub async fn insert_user(pool: &SqlitePool, username: &str, is_staff: bool) -> i64 {
        sqlx::query("INSERT INTO users (username, is_staff, created_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind(is_staff)
            .bind(Utc::now())
            .execute(pool)
            .await
            .expect("Failed to insert user")
            .last_insert_rowid()
    }

    pub async fn insert_tag(pool: &SqlitePool, title: &str) -> i64 {
        sqlx::query("INSERT INTO tags (title) VALUES (?)")
            .bind(title)
            .execute(pool)
            .await
            .expect("Failed to insert tag")
            .last_insert_rowid()
    }

    pub async fn insert_post(
        pool: &SqlitePool,
        author_id: i64,
        slug: &str,
        published_at: DateTime<Utc>,
    ) -> i64 {
        sqlx::query(
            "INSERT INTO posts (title, text, slug, published_at, author_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(format!("Title of {}", slug))
        .bind("Some text")
        .bind(slug)
        .bind(published_at)
        .bind(author_id)
        .execute(pool)
        .await
        .expect("Failed to insert post")
        .last_insert_rowid()
    }

    pub async fn tag_post(pool: &SqlitePool, post_id: i64, tag_id: i64) {
        sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag_id)
            .execute(pool)
            .await
            .expect("Failed to tag post");
    }

    pub async fn like_post(pool: &SqlitePool, post_id: i64, user_id: i64) {
        sqlx::query("INSERT INTO post_likes (post_id, user_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(user_id)
            .execute(pool)
            .await
            .expect("Failed to like post");
    }

    pub async fn insert_comment(pool: &SqlitePool, post_id: i64, author_id: i64, text: &str) {
        sqlx::query(
            "INSERT INTO comments (post_id, author_id, text, published_at) VALUES (?, ?, ?, ?)",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .bind(Utc::now())
        .execute(pool)
        .await
        .expect("Failed to insert comment");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
