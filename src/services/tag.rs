//! Tag service
//!
//! Tag creation with title normalization, lookups for the tag filter page and
//! the popular tags side panel.

use crate::db::repositories::TagRepository;
use crate::models::{Tag, TAG_TITLE_MAX_LEN};
use anyhow::Context;
use std::sync::Arc;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A tag with the same (normalized) title exists
    #[error("Tag already exists: {0}")]
    DuplicateTitle(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Tag service for managing blog tags
pub struct TagService {
    repo: Arc<dyn TagRepository>,
}

impl TagService {
    /// Create a new tag service
    pub fn new(repo: Arc<dyn TagRepository>) -> Self {
        Self { repo }
    }

    /// Create a tag.
    ///
    /// The title is lowercased by [`Tag::clean`] before it is validated, so
    /// `"Python"` and `"python"` are the same tag.
    ///
    /// # Errors
    /// - `ValidationError` if the title is empty or longer than 20 characters
    /// - `DuplicateTitle` if the normalized title is taken
    pub async fn create(&self, title: &str) -> Result<Tag, TagServiceError> {
        let tag = validated_tag(title)?;

        if self
            .repo
            .get_by_title(&tag.title)
            .await
            .context("Failed to check existing tag")?
            .is_some()
        {
            return Err(TagServiceError::DuplicateTitle(tag.title));
        }

        let created = self.repo.create(&tag).await.context("Failed to create tag")?;
        tracing::debug!(tag_id = created.id, title = %created.title, "Created tag");
        Ok(created)
    }

    /// Return the tag with this (normalized) title, creating it if needed
    pub async fn create_or_get(&self, title: &str) -> Result<Tag, TagServiceError> {
        let tag = validated_tag(title)?;

        if let Some(existing) = self
            .repo
            .get_by_title(&tag.title)
            .await
            .context("Failed to check existing tag")?
        {
            return Ok(existing);
        }

        self.repo
            .create(&tag)
            .await
            .context("Failed to create tag")
            .map_err(Into::into)
    }

    /// Exact title match, annotated with `posts_amount`.
    ///
    /// The title is not normalized here; stored titles are always lowercase.
    pub async fn get_by_title(&self, title: &str) -> Result<Option<Tag>, TagServiceError> {
        self.repo
            .get_by_title(title)
            .await
            .context("Failed to get tag by title")
            .map_err(Into::into)
    }

    /// Most used tags first, annotated with `posts_amount`
    pub async fn popular(&self, limit: usize) -> Result<Vec<Tag>, TagServiceError> {
        self.repo
            .popular(limit)
            .await
            .context("Failed to get popular tags")
            .map_err(Into::into)
    }
}

fn validated_tag(title: &str) -> Result<Tag, TagServiceError> {
    let mut tag = Tag::new(title.trim());
    tag.clean();

    if tag.title.is_empty() {
        return Err(TagServiceError::ValidationError(
            "Tag title cannot be empty".to_string(),
        ));
    }
    if tag.title.chars().count() > TAG_TITLE_MAX_LEN {
        return Err(TagServiceError::ValidationError(format!(
            "Tag title cannot exceed {} characters",
            TAG_TITLE_MAX_LEN
        )));
    }

    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::migrated_pool;
    use crate::db::repositories::SqlxTagRepository;

    async fn setup_test_service() -> TagService {
        TagService::new(SqlxTagRepository::boxed(migrated_pool().await))
    }

    #[tokio::test]
    async fn test_create_lowercases_title() {
        let service = setup_test_service().await;

        let tag = service.create("Python").await.unwrap();
        assert_eq!(tag.title, "python");

        let found = service.get_by_title("python").await.unwrap().unwrap();
        assert_eq!(found.id, tag.id);
        assert_eq!(found.posts_amount, Some(0));
    }

    #[tokio::test]
    async fn test_create_duplicate_title_any_case() {
        let service = setup_test_service().await;
        service.create("rust").await.unwrap();

        let result = service.create("RUST").await;
        assert!(matches!(result, Err(TagServiceError::DuplicateTitle(t)) if t == "rust"));
    }

    #[tokio::test]
    async fn test_create_validates_length() {
        let service = setup_test_service().await;

        assert!(matches!(
            service.create("  ").await,
            Err(TagServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(&"x".repeat(21)).await,
            Err(TagServiceError::ValidationError(_))
        ));
        assert!(service.create(&"x".repeat(20)).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_or_get_reuses_tag() {
        let service = setup_test_service().await;

        let first = service.create_or_get("Django").await.unwrap();
        let second = service.create_or_get("django").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_popular_limit() {
        let service = setup_test_service().await;
        for title in ["a", "b", "c", "d", "e", "f"] {
            service.create(title).await.unwrap();
        }

        let popular = service.popular(5).await.unwrap();
        assert_eq!(popular.len(), 5);
        assert!(popular.iter().all(|t| t.posts_amount == Some(0)));
    }
}
