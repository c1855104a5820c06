//! Shared handler state and page errors

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::responses::SerializeError;
use crate::config::{MediaConfig, SiteConfig};
use crate::services::{
    CommentService, CommentServiceError, PostService, PostServiceError, TagService,
    TagServiceError,
};
use crate::theme::{StandardTemplateVars, ThemeEngine};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub post_service: Arc<PostService>,
    pub tag_service: Arc<TagService>,
    pub comment_service: Arc<CommentService>,
    pub theme_engine: Arc<ThemeEngine>,
    pub media: Arc<MediaConfig>,
    pub site: Arc<SiteConfig>,
}

impl AppState {
    pub fn standard_vars(&self, request_path: &str) -> StandardTemplateVars {
        StandardTemplateVars::new(self.site.name.clone(), request_path)
    }
}

/// Failure while building a page
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// Slug or title lookup missed
    #[error("{0} not found")]
    NotFound(String),

    /// A record reached serialization without its annotations
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error("Template rendering failed: {0}")]
    Render(anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
}

impl PageError {
    pub fn status(&self) -> StatusCode {
        match self {
            PageError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log the error and render it as an HTML error page
    pub fn into_page(self, state: &AppState, request_path: &str) -> Response {
        let status = self.status();
        let message = match &self {
            PageError::NotFound(what) => {
                tracing::warn!(path = %request_path, "{} not found", what);
                self.to_string()
            }
            other => {
                tracing::error!(path = %request_path, error = %other, "Failed to build page");
                "Internal server error".to_string()
            }
        };

        let html = state.theme_engine.render_error_page(
            status.as_u16(),
            &message,
            &state.standard_vars(request_path),
        );
        (status, Html(html)).into_response()
    }
}

impl From<PostServiceError> for PageError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(slug) => PageError::NotFound(format!("Post '{}'", slug)),
            other => PageError::Internal(other.into()),
        }
    }
}

impl From<TagServiceError> for PageError {
    fn from(err: TagServiceError) -> Self {
        PageError::Internal(err.into())
    }
}

impl From<CommentServiceError> for PageError {
    fn from(err: CommentServiceError) -> Self {
        PageError::Internal(err.into())
    }
}
