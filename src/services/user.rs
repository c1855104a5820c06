//! User service

use crate::db::repositories::UserRepository;
use crate::models::User;
use anyhow::Context;
use std::sync::Arc;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Service for the users that author posts and comments
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Register a user. Only staff users may author posts.
    pub async fn create_user(&self, username: &str, is_staff: bool) -> Result<User, UserServiceError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username cannot be empty".to_string(),
            ));
        }

        if self
            .repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::DuplicateUsername(username.to_string()));
        }

        let user = self
            .repo
            .create(&User::new(username.to_string(), is_staff))
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = user.id, username = %user.username, "Created user");
        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        self.repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")
            .map_err(Into::into)
    }
}
