//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    pub published_at: DateTime<Utc>,
}

/// Comment joined with its author's username and the post title, for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    pub id: i64,
    pub post_id: i64,
    pub post_title: String,
    pub author_id: i64,
    pub author: String,
    pub text: String,
    pub published_at: DateTime<Utc>,
}

impl fmt::Display for CommentWithAuthor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} under {}", self.author, self.post_title)
    }
}

/// Input for creating a comment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentInput {
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let comment = CommentWithAuthor {
            id: 1,
            post_id: 2,
            post_title: "Intro to Rust".to_string(),
            author_id: 3,
            author: "bob".to_string(),
            text: "Nice".to_string(),
            published_at: Utc::now(),
        };
        assert_eq!(comment.to_string(), "bob under Intro to Rust");
    }
}
