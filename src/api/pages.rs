//! HTML page handlers
//!
//! Each handler loads its records through the services, serializes them and
//! renders one template. Every page except contacts carries the two side
//! panels: the most popular posts and the most popular tags.

use axum::{
    extract::{Path, State},
    http::Uri,
    response::{Html, IntoResponse, Response},
};
use tera::Context as TeraContext;

use crate::api::middleware::{AppState, PageError};
use crate::api::responses::{
    serialize_post, serialize_post_detail, serialize_tag, PostTeaser, TagSummary,
};
use crate::models::Post;

/// Size of the home page lists and side panels
pub const PANEL_SIZE: usize = 5;

/// `GET /`
pub async fn index(State(state): State<AppState>, uri: Uri) -> Response {
    let page = async {
        let mut context = TeraContext::new();
        context.insert("most_popular_posts", &most_popular_posts(&state).await?);
        let recent = state.post_service.recent_posts(PANEL_SIZE).await?;
        context.insert("page_posts", &serialize_posts(&recent, &state)?);
        context.insert("popular_tags", &popular_tags(&state).await?);
        Ok::<_, PageError>(context)
    }
    .await;

    respond(&state, uri.path(), "index.html", page)
}

/// `GET /posts/{slug}/`
pub async fn post_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    uri: Uri,
) -> Response {
    let page = async {
        let post = state.post_service.get_detail(&slug).await?;
        let comments = state.comment_service.list_for_post(post.id).await?;

        let mut context = TeraContext::new();
        context.insert(
            "post",
            &serialize_post_detail(&post, &comments, &state.media)?,
        );
        context.insert("popular_tags", &popular_tags(&state).await?);
        context.insert("most_popular_posts", &most_popular_posts(&state).await?);
        Ok::<_, PageError>(context)
    }
    .await;

    respond(&state, uri.path(), "post-details.html", page)
}

/// `GET /tags/{title}/`
pub async fn tag_filter(
    State(state): State<AppState>,
    Path(title): Path<String>,
    uri: Uri,
) -> Response {
    let page = async {
        let tag = state
            .tag_service
            .get_by_title(&title)
            .await?
            .ok_or_else(|| PageError::NotFound(format!("Tag '{}'", title)))?;
        let posts = state.post_service.posts_with_tag(tag.id).await?;

        let mut context = TeraContext::new();
        context.insert("tag", &tag.title);
        context.insert("popular_tags", &popular_tags(&state).await?);
        context.insert("posts", &serialize_posts(&posts, &state)?);
        context.insert("most_popular_posts", &most_popular_posts(&state).await?);
        Ok::<_, PageError>(context)
    }
    .await;

    respond(&state, uri.path(), "posts-list.html", page)
}

/// `GET /contacts/`
pub async fn contacts(State(state): State<AppState>, uri: Uri) -> Response {
    respond(&state, uri.path(), "contacts.html", Ok(TeraContext::new()))
}

async fn most_popular_posts(state: &AppState) -> Result<Vec<PostTeaser>, PageError> {
    let posts = state.post_service.popular_posts(PANEL_SIZE).await?;
    serialize_posts(&posts, state)
}

async fn popular_tags(state: &AppState) -> Result<Vec<TagSummary>, PageError> {
    let tags = state.tag_service.popular(PANEL_SIZE).await?;
    Ok(tags.iter().map(serialize_tag).collect::<Result<Vec<_>, _>>()?)
}

fn serialize_posts(posts: &[Post], state: &AppState) -> Result<Vec<PostTeaser>, PageError> {
    Ok(posts
        .iter()
        .map(|post| serialize_post(post, &state.media))
        .collect::<Result<Vec<_>, _>>()?)
}

fn respond(
    state: &AppState,
    request_path: &str,
    template: &str,
    page: Result<TeraContext, PageError>,
) -> Response {
    let html = page.and_then(|context| {
        state
            .theme_engine
            .render_with_standard_vars(template, &context, &state.standard_vars(request_path))
            .map_err(PageError::Render)
    });

    match html {
        Ok(html) => Html(html).into_response(),
        Err(err) => err.into_page(state, request_path),
    }
}
