//! Tag model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum tag title length in characters
pub const TAG_TITLE_MAX_LEN: usize = 20;

/// A tag attached to posts.
///
/// `posts_amount` is only filled by queries that annotate the number of
/// posts carrying the tag; it is `None` on plain lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: i64,
    /// Unique, lowercase title
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts_amount: Option<i64>,
}

impl Tag {
    /// Create a new Tag. The ID is assigned by the database.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            posts_amount: None,
        }
    }

    /// Normalize the title before validation and save.
    pub fn clean(&mut self) {
        self.title = self.title.to_lowercase();
    }

    /// Path of the tag filter page
    pub fn absolute_url(&self) -> String {
        format!("/tags/{}/", urlencoding::encode(&self.title))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}
