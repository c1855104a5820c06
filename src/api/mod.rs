//! HTTP layer - routing and page handlers
//!
//! - HTML pages (home, post detail, tag filter, contacts)
//! - Uploaded media served from disk under the configured media URL

pub mod middleware;
pub mod pages;
pub mod responses;

use axum::{routing::get, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use middleware::{AppState, PageError};

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(pages::index))
        .route("/posts/{slug}/", get(pages::post_detail))
        .route("/tags/{title}/", get(pages::tag_filter))
        .route("/contacts/", get(pages::contacts));

    // Only a site-relative media URL is served locally; anything else is
    // expected to be a CDN or another host.
    let media_prefix = state.media.url.trim_end_matches('/');
    if media_prefix.starts_with('/') && media_prefix.len() > 1 {
        router = router.nest_service(media_prefix, ServeDir::new(&state.media.path));
    } else {
        tracing::debug!("Media URL {:?} is not served by this process", state.media.url);
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
