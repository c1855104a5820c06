//! Comment service

use std::sync::Arc;

use anyhow::Context;

use crate::db::repositories::CommentRepository;
use crate::models::{Comment, CommentWithAuthor, CreateCommentInput};

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>) -> Self {
        Self { repo }
    }

    /// Add a comment to a post
    pub async fn create(&self, input: CreateCommentInput) -> Result<Comment, CommentServiceError> {
        if input.text.trim().is_empty() {
            return Err(CommentServiceError::ValidationError(
                "Comment text cannot be empty".to_string(),
            ));
        }

        let comment = self
            .repo
            .create(&input)
            .await
            .context("Failed to create comment")?;
        tracing::debug!(comment_id = comment.id, post_id = comment.post_id, "Created comment");
        Ok(comment)
    }

    /// Comments on a post, oldest first
    pub async fn list_for_post(
        &self,
        post_id: i64,
    ) -> Result<Vec<CommentWithAuthor>, CommentServiceError> {
        self.repo
            .list_for_post(post_id)
            .await
            .context("Failed to list comments")
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::*;
    use crate::db::repositories::SqlxCommentRepository;

    #[tokio::test]
    async fn test_create_and_list() {
        let pool = migrated_pool().await;
        let db = pool.as_sqlite().unwrap();
        let service = CommentService::new(SqlxCommentRepository::boxed(pool.clone()));

        let alice = insert_user(db, "alice", true).await;
        let post = insert_post(db, alice, "hello", day(1)).await;

        assert!(matches!(
            service
                .create(CreateCommentInput {
                    post_id: post,
                    author_id: alice,
                    text: "  ".to_string(),
                })
                .await,
            Err(CommentServiceError::ValidationError(_))
        ));

        service
            .create(CreateCommentInput {
                post_id: post,
                author_id: alice,
                text: "Welcome".to_string(),
            })
            .await
            .unwrap();

        let comments = service.list_for_post(post).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author, "alice");
    }
}
