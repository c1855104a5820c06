//! Page data types
//!
//! Pure projections of annotated models into the structures the templates
//! render. Every function here expects its input to carry the annotations of
//! the query that produced it; a missing one is reported as
//! [`SerializeError::MissingAnnotation`] rather than silently defaulted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::MediaConfig;
use crate::models::{CommentWithAuthor, Post, Tag};

/// Characters of post text shown in listings
pub const TEASER_LENGTH: usize = 200;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SerializeError {
    /// A derived field was never populated by the query that loaded the record
    #[error("{record} is missing the `{field}` annotation")]
    MissingAnnotation { record: String, field: &'static str },

    /// Listings need a first tag title, and this post has none
    #[error("post `{slug}` has no tags")]
    NoTags { slug: String },
}

// ============================================================================
// Response Types
// ============================================================================

/// Tag as shown in side panels and tag lists
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TagSummary {
    pub title: String,
    pub posts_amount: i64,
}

/// Post card used by every listing
#[derive(Debug, Clone, Serialize)]
pub struct PostTeaser {
    pub title: String,
    pub teaser_text: String,
    pub author: String,
    pub comments_amount: i64,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub slug: String,
    pub tags: Vec<TagSummary>,
    pub first_tag_title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentSummary {
    pub text: String,
    pub published_at: DateTime<Utc>,
    pub author: String,
}

/// Full post for the detail page
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub title: String,
    pub text: String,
    pub author: String,
    pub comments: Vec<CommentSummary>,
    pub likes_amount: i64,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub slug: String,
    pub tags: Vec<TagSummary>,
}

// ============================================================================
// Conversions
// ============================================================================

pub fn serialize_tag(tag: &Tag) -> Result<TagSummary, SerializeError> {
    Ok(TagSummary {
        title: tag.title.clone(),
        posts_amount: tag.posts_amount.ok_or_else(|| missing(tag, "posts_amount"))?,
    })
}

/// Project a listed post. Requires `comments_amount`, `author` and annotated
/// `tags`.
pub fn serialize_post(post: &Post, media: &MediaConfig) -> Result<PostTeaser, SerializeError> {
    let tags = post_tags(post)?;
    let first_tag_title = tags
        .first()
        .map(|t| t.title.clone())
        .ok_or_else(|| SerializeError::NoTags {
            slug: post.slug.clone(),
        })?;

    Ok(PostTeaser {
        title: post.title.clone(),
        teaser_text: post.text.chars().take(TEASER_LENGTH).collect(),
        author: author_name(post)?,
        comments_amount: post
            .comments_amount
            .ok_or_else(|| missing(post, "comments_amount"))?,
        image_url: image_url(post, media),
        published_at: post.published_at,
        slug: post.slug.clone(),
        tags,
        first_tag_title,
    })
}

/// Project the post on its detail page. Requires `likes_amount`, `author`
/// and annotated `tags`; zero tags is fine here.
pub fn serialize_post_detail(
    post: &Post,
    comments: &[CommentWithAuthor],
    media: &MediaConfig,
) -> Result<PostDetail, SerializeError> {
    Ok(PostDetail {
        title: post.title.clone(),
        text: post.text.clone(),
        author: author_name(post)?,
        comments: comments
            .iter()
            .map(|c| CommentSummary {
                text: c.text.clone(),
                published_at: c.published_at,
                author: c.author.clone(),
            })
            .collect(),
        likes_amount: post.likes_amount.ok_or_else(|| missing(post, "likes_amount"))?,
        image_url: image_url(post, media),
        published_at: post.published_at,
        slug: post.slug.clone(),
        tags: post_tags(post)?,
    })
}

fn post_tags(post: &Post) -> Result<Vec<TagSummary>, SerializeError> {
    post.tags
        .as_ref()
        .ok_or_else(|| missing(post, "tags"))?
        .iter()
        .map(serialize_tag)
        .collect()
}

fn author_name(post: &Post) -> Result<String, SerializeError> {
    post.author
        .as_ref()
        .map(|u| u.username.clone())
        .ok_or_else(|| missing(post, "author"))
}

fn image_url(post: &Post, media: &MediaConfig) -> Option<String> {
    post.image
        .as_deref()
        .filter(|image| !image.is_empty())
        .map(|image| media.image_url(image))
}

fn missing(record: &impl std::fmt::Display, field: &'static str) -> SerializeError {
    SerializeError::MissingAnnotation {
        record: record.to_string(),
        field,
    }
}
