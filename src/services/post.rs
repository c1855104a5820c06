//! Post service
//!
//! Implements business logic for posts:
//! - Creation with slug derivation and author/tag validation
//! - Popular, recent, per-tag and per-year listings
//! - Detail lookup by slug
//! - Likes and tag associations
//!
//! Listings return fully prepared posts: the aggregate annotation for the
//! listing (likes or comments) plus `author` and annotated `tags` prefetched
//! with one query each.

use crate::db::repositories::{PostRepository, TagRepository, UserRepository};
use crate::models::{CreatePostInput, Post, Tag, POST_TITLE_MAX_LEN};
use anyhow::Context;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post not found
    #[error("Post not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Slug already in use
    #[error("Slug already exists: {0}")]
    DuplicateSlug(String),

    /// Posts can only be authored by staff users
    #[error("User is not staff: {0}")]
    AuthorNotStaff(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Post service
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    tags: Arc<dyn TagRepository>,
    users: Arc<dyn UserRepository>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        tags: Arc<dyn TagRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self { posts, tags, users }
    }

    /// Create a post and attach its tags.
    ///
    /// When `input.slug` is missing or empty it is derived once from the
    /// title with [`generate_slug`].
    ///
    /// # Errors
    /// - `ValidationError` for an empty or over-long title or slug, a slug
    ///   with characters outside `[-A-Za-z0-9_]`, an unknown author or tag,
    ///   or an empty tag list
    /// - `AuthorNotStaff` if the author is not a staff user
    /// - `DuplicateSlug` if another post already uses the slug
    pub async fn create(&self, input: CreatePostInput) -> Result<Post, PostServiceError> {
        if input.title.trim().is_empty() {
            return Err(PostServiceError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }
        if input.title.chars().count() > POST_TITLE_MAX_LEN {
            return Err(PostServiceError::ValidationError(format!(
                "Title cannot exceed {} characters",
                POST_TITLE_MAX_LEN
            )));
        }

        let slug = match input.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => generate_slug(&input.title),
        };
        if slug.is_empty() {
            return Err(PostServiceError::ValidationError(format!(
                "Cannot derive a slug from title {:?}",
                input.title
            )));
        }
        if !is_slug(&slug) {
            return Err(PostServiceError::ValidationError(format!(
                "Slug {:?} may only contain ASCII letters, digits, '-' and '_'",
                slug
            )));
        }
        if slug.chars().count() > POST_TITLE_MAX_LEN {
            return Err(PostServiceError::ValidationError(format!(
                "Slug cannot exceed {} characters",
                POST_TITLE_MAX_LEN
            )));
        }

        let author = self
            .users
            .get_by_id(input.author_id)
            .await
            .context("Failed to get author")?
            .ok_or_else(|| {
                PostServiceError::ValidationError(format!("Unknown author: {}", input.author_id))
            })?;
        if !author.is_staff {
            return Err(PostServiceError::AuthorNotStaff(author.username));
        }

        if input.tag_ids.is_empty() {
            return Err(PostServiceError::ValidationError(
                "A post needs at least one tag".to_string(),
            ));
        }
        for tag_id in &input.tag_ids {
            if self
                .tags
                .get_by_id(*tag_id)
                .await
                .context("Failed to get tag")?
                .is_none()
            {
                return Err(PostServiceError::ValidationError(format!(
                    "Unknown tag: {}",
                    tag_id
                )));
            }
        }

        if self
            .posts
            .exists_by_slug(&slug)
            .await
            .context("Failed to check slug")?
        {
            return Err(PostServiceError::DuplicateSlug(slug));
        }

        let post = Post {
            id: 0,
            title: input.title,
            text: input.text,
            slug,
            image: input.image.filter(|image| !image.is_empty()),
            published_at: input.published_at.unwrap_or_else(Utc::now),
            author_id: author.id,
            author: None,
            tags: None,
            likes_amount: None,
            comments_amount: None,
        };
        let created = self.posts.create(&post).await.context("Failed to create post")?;

        for tag_id in &input.tag_ids {
            self.tags
                .add_to_post(*tag_id, created.id)
                .await
                .context("Failed to tag post")?;
        }

        tracing::info!(post_id = created.id, slug = %created.slug, "Created post");
        Ok(created)
    }

    /// Most liked posts with comment counts, authors and tags.
    ///
    /// Ranking and the comment-count backfill are separate queries; a post
    /// deleted in between surfaces as an internal error.
    pub async fn popular_posts(&self, limit: usize) -> Result<Vec<Post>, PostServiceError> {
        let mut posts = self
            .posts
            .rank_by_likes(limit)
            .await
            .context("Failed to rank posts")?;
        self.posts
            .attach_comment_counts(&mut posts)
            .await
            .context("Failed to attach comment counts")?;
        self.prefetch(&mut posts).await?;
        Ok(posts)
    }

    /// Newest posts with comment counts, authors and tags
    pub async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>, PostServiceError> {
        let mut posts = self
            .posts
            .list_recent(limit)
            .await
            .context("Failed to list recent posts")?;
        self.prefetch(&mut posts).await?;
        Ok(posts)
    }

    /// Every post carrying the tag, newest first
    pub async fn posts_with_tag(&self, tag_id: i64) -> Result<Vec<Post>, PostServiceError> {
        let mut posts = self
            .posts
            .list_by_tag(tag_id)
            .await
            .context("Failed to list posts by tag")?;
        self.prefetch(&mut posts).await?;
        Ok(posts)
    }

    /// Post by slug with like count, author and tags
    pub async fn get_detail(&self, slug: &str) -> Result<Post, PostServiceError> {
        let post = self
            .posts
            .get_by_slug(slug)
            .await
            .context("Failed to get post by slug")?
            .ok_or_else(|| PostServiceError::NotFound(slug.to_string()))?;

        let mut posts = [post];
        self.prefetch(&mut posts).await?;
        let [post] = posts;
        Ok(post)
    }

    pub async fn posts_of_year(&self, year: i32) -> Result<Vec<Post>, PostServiceError> {
        self.posts
            .list_by_year(year)
            .await
            .context("Failed to list posts by year")
            .map_err(Into::into)
    }

    pub async fn like(&self, post_id: i64, user_id: i64) -> Result<(), PostServiceError> {
        self.posts
            .add_like(post_id, user_id)
            .await
            .context("Failed to like post")
            .map_err(Into::into)
    }

    pub async fn unlike(&self, post_id: i64, user_id: i64) -> Result<(), PostServiceError> {
        self.posts
            .remove_like(post_id, user_id)
            .await
            .context("Failed to remove like")
            .map_err(Into::into)
    }

    pub async fn add_tag(&self, post_id: i64, tag_id: i64) -> Result<(), PostServiceError> {
        self.tags
            .add_to_post(tag_id, post_id)
            .await
            .context("Failed to tag post")
            .map_err(Into::into)
    }

    /// Load `author` and annotated `tags` for all posts with one query each
    async fn prefetch(&self, posts: &mut [Post]) -> Result<(), PostServiceError> {
        if posts.is_empty() {
            return Ok(());
        }

        let author_ids: Vec<i64> = posts
            .iter()
            .map(|p| p.author_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let authors: HashMap<i64, _> = self
            .users
            .get_by_ids(&author_ids)
            .await
            .context("Failed to load authors")?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
        for (post_id, tag) in self
            .tags
            .get_for_posts(&post_ids)
            .await
            .context("Failed to load tags")?
        {
            tags.entry(post_id).or_default().push(tag);
        }

        for post in posts.iter_mut() {
            post.author = authors.get(&post.author_id).cloned();
            post.tags = Some(tags.remove(&post.id).unwrap_or_default());
        }

        Ok(())
    }
}

/// Derive a URL slug from a title.
///
/// Accents are folded away through NFKD decomposition and any remaining
/// non-ASCII character is dropped. The rest is lowercased; ASCII letters,
/// digits and `_` are kept, runs of whitespace and `-` become a single `-`
/// and leading/trailing `-` and `_` are trimmed. May return an empty string.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.nfkd().filter(char::is_ascii) {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_ascii_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Slugs are a single path segment of ASCII letters, digits, `-` and `_`
fn is_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
