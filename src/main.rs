//! Blogfront server

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blogfront::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxCommentRepository, SqlxPostRepository, SqlxTagRepository, SqlxUserRepository,
        },
    },
    services::{CommentService, PostService, TagService},
    theme::ThemeEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blogfront=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Blogfront...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let tag_repo = SqlxTagRepository::boxed(pool.clone());
    let post_repo = SqlxPostRepository::boxed(pool.clone());
    let comment_repo = SqlxCommentRepository::boxed(pool.clone());

    let post_service = Arc::new(PostService::new(post_repo, tag_repo.clone(), user_repo.clone()));
    let tag_service = Arc::new(TagService::new(tag_repo));
    let comment_service = Arc::new(CommentService::new(comment_repo));

    #[cfg(feature = "demo")]
    demo::seed(user_repo, &tag_service, &post_service, &comment_service).await?;

    let theme_engine = Arc::new(ThemeEngine::new(config.theme.path.as_deref())?);
    tracing::info!("Theme engine initialized");

    let state = AppState {
        post_service,
        tag_service,
        comment_service,
        theme_engine,
        media: Arc::new(config.media.clone()),
        site: Arc::new(config.site.clone()),
    };

    let app = api::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "demo")]
mod demo {
    //! Sample content for a fresh database

    use anyhow::Result;
    use std::sync::Arc;

    use blogfront::{
        db::repositories::UserRepository,
        models::{CreateCommentInput, CreatePostInput},
        services::{CommentService, PostService, TagService, UserService},
    };

    pub async fn seed(
        user_repo: Arc<dyn UserRepository>,
        tags: &TagService,
        posts: &PostService,
        comments: &CommentService,
    ) -> Result<()> {
        let users = UserService::new(user_repo);
        if users.get_by_username("editor").await?.is_some() {
            tracing::debug!("Demo content already present");
            return Ok(());
        }

        let editor = users.create_user("editor", true).await?;
        let reader = users.create_user("reader", false).await?;
        let rust = tags.create_or_get("rust").await?;
        let web = tags.create_or_get("web").await?;

        let post = posts
            .create(CreatePostInput {
                title: "Hello, Blogfront".to_string(),
                text: "The first post. Pages are rendered from Tera templates.".to_string(),
                author_id: editor.id,
                tag_ids: vec![rust.id, web.id],
                ..Default::default()
            })
            .await?;
        posts.like(post.id, reader.id).await?;
        comments
            .create(CreateCommentInput {
                post_id: post.id,
                author_id: reader.id,
                text: "Welcome!".to_string(),
            })
            .await?;

        tracing::info!("Demo content created: /posts/{}/", post.slug);
        Ok(())
    }
}
