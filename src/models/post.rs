//! Post model
//!
//! This module provides:
//! - `Post` entity with optional query annotations
//! - `CreatePostInput` for the write path

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Tag, User};

/// Maximum post title and slug length in characters
pub const POST_TITLE_MAX_LEN: usize = 200;

/// A blog post.
///
/// The `Option` fields below the stored columns are not persisted. Each one
/// is populated by the repository query (or prefetch) that computes it and
/// stays `None` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    /// URL-friendly identifier (unique)
    pub slug: String,
    /// Relative path of the post image under the media root
    pub image: Option<String>,
    pub published_at: DateTime<Utc>,
    pub author_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_amount: Option<i64>,
}

impl Post {
    /// Path of the post detail page
    pub fn absolute_url(&self) -> String {
        format!("/posts/{}/", self.slug)
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Input for creating a post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub text: String,
    /// Derived from the title when empty or missing
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub author_id: i64,
    /// At least one tag is required
    pub tag_ids: Vec<i64>,
    /// Defaults to now
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post() -> Post {
        Post {
            id: 1,
            title: "Hello World".to_string(),
            text: "Body".to_string(),
            slug: "hello-world".to_string(),
            image: None,
            published_at: Utc::now(),
            author_id: 1,
            author: None,
            tags: None,
            likes_amount: None,
            comments_amount: None,
        }
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(sample_post().absolute_url(), "/posts/hello-world/");
    }

    #[test]
    fn test_display_is_title() {
        assert_eq!(sample_post().to_string(), "Hello World");
    }

    #[test]
    fn test_unset_annotations_are_not_serialized() {
        let json = serde_json::to_value(sample_post()).unwrap();
        assert!(json.get("likes_amount").is_none());
        assert!(json.get("tags").is_none());
        assert_eq!(json["slug"], "hello-world");
    }
}
