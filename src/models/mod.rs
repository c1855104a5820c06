//! Data models
//!
//! Database entities and input types. Fields computed by aggregate queries
//! are carried as `Option` annotations on the entities themselves.

mod comment;
mod post;
mod tag;
mod user;

pub use comment::{Comment, CommentWithAuthor, CreateCommentInput};
pub use post::{CreatePostInput, Post, POST_TITLE_MAX_LEN};
pub use tag::{Tag, TAG_TITLE_MAX_LEN};
pub use user::User;
