//! Database migrations
//!
//! Schema changes are embedded in the binary as SQL strings, one variant per
//! supported backend. Applied versions are tracked in the `_migrations` table.
//!
//! ```ignore
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use sqlx::Row;

use super::{mysql, sqlite, DynDatabasePool};
use crate::config::DatabaseDriver;

/// A schema migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique, increasing version number
    pub version: i32,
    pub name: &'static str,
    pub up_sqlite: &'static str,
    pub up_mysql: &'static str,
}

impl Migration {
    fn sql_for(&self, driver: DatabaseDriver) -> &'static str {
        match driver {
            DatabaseDriver::Sqlite => self.up_sqlite,
            DatabaseDriver::Mysql => self.up_mysql,
        }
    }
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                is_staff BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                is_staff BOOLEAN NOT NULL DEFAULT FALSE,
                created_at DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6)
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_tags",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(20) NOT NULL UNIQUE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(20) NOT NULL UNIQUE
            );
        "#,
    },
    // Slugs are unique so that detail-page lookups are deterministic.
    Migration {
        version: 3,
        name: "create_posts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(200) NOT NULL,
                text TEXT NOT NULL,
                slug VARCHAR(200) NOT NULL UNIQUE,
                image VARCHAR(255),
                published_at TIMESTAMP NOT NULL,
                author_id INTEGER NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_posts_published_at ON posts(published_at);
            CREATE INDEX IF NOT EXISTS idx_posts_author_id ON posts(author_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS posts (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(200) NOT NULL,
                text TEXT NOT NULL,
                slug VARCHAR(200) NOT NULL UNIQUE,
                image VARCHAR(255),
                published_at DATETIME(6) NOT NULL,
                author_id BIGINT NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_posts_published_at ON posts(published_at);
        "#,
    },
    Migration {
        version: 4,
        name: "create_post_tags",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS post_tags (
                post_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                PRIMARY KEY (post_id, tag_id),
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_post_tags_tag_id ON post_tags(tag_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS post_tags (
                post_id BIGINT NOT NULL,
                tag_id BIGINT NOT NULL,
                PRIMARY KEY (post_id, tag_id),
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_post_tags_tag_id ON post_tags(tag_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_post_likes",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS post_likes (
                post_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (post_id, user_id),
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_post_likes_user_id ON post_likes(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS post_likes (
                post_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                PRIMARY KEY (post_id, user_id),
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 6,
        name: "create_comments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL,
                author_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                published_at TIMESTAMP NOT NULL,
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                post_id BIGINT NOT NULL,
                author_id BIGINT NOT NULL,
                text TEXT NOT NULL,
                published_at DATETIME(6) NOT NULL,
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
    },
];

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY,
        name VARCHAR(255) NOT NULL UNIQUE,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

/// Apply every migration that has not been recorded yet.
///
/// Returns the number of migrations applied by this call.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    let applied = applied_versions(pool).await?;
    let mut count = 0;

    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        tracing::info!("Applying migration {}: {}", migration.version, migration.name);
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Versions recorded in `_migrations`, creating the table if needed
async fn applied_versions(pool: &DynDatabasePool) -> Result<Vec<i32>> {
    let select = "SELECT version FROM _migrations ORDER BY version";
    match pool.driver() {
        DatabaseDriver::Sqlite => {
            let pool = sqlite(pool)?;
            sqlx::query(CREATE_MIGRATIONS_TABLE)
                .execute(pool)
                .await
                .context("Failed to create migrations table")?;
            let rows = sqlx::query(select).fetch_all(pool).await?;
            Ok(rows.iter().map(|r| r.get::<i64, _>("version") as i32).collect())
        }
        DatabaseDriver::Mysql => {
            let pool = mysql(pool)?;
            sqlx::query(CREATE_MIGRATIONS_TABLE)
                .execute(pool)
                .await
                .context("Failed to create migrations table")?;
            let rows = sqlx::query(select).fetch_all(pool).await?;
            Ok(rows.iter().map(|r| r.get::<i32, _>("version")).collect())
        }
    }
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let record = "INSERT INTO _migrations (version, name) VALUES (?, ?)";

    match pool.driver() {
        DatabaseDriver::Sqlite => {
            let pool = sqlite(pool)?;
            for statement in split_sql_statements(migration.sql_for(DatabaseDriver::Sqlite)) {
                sqlx::query(statement)
                    .execute(pool)
                    .await
                    .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
            }
            sqlx::query(record)
                .bind(migration.version)
                .bind(migration.name)
                .execute(pool)
                .await?;
        }
        DatabaseDriver::Mysql => {
            let pool = mysql(pool)?;
            for statement in split_sql_statements(migration.sql_for(DatabaseDriver::Mysql)) {
                sqlx::query(statement)
                    .execute(pool)
                    .await
                    .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
            }
            sqlx::query(record)
                .bind(migration.version)
                .bind(migration.name)
                .execute(pool)
                .await?;
        }
    }

    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split a migration body into statements, dropping comment-only fragments.
///
/// Migration SQL never contains `;` inside literals.
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !is_comment_only(s))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    let applied = applied_versions(pool).await?;
    Ok(MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .count())
}
