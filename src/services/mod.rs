//! Services layer - Business logic
//!
//! Services validate input, enforce business rules and compose repository
//! calls into the fully prepared records the pages display.

pub mod comment;
pub mod post;
pub mod tag;
pub mod user;

pub use comment::{CommentService, CommentServiceError};
pub use post::{generate_slug, PostService, PostServiceError};
pub use tag::{TagService, TagServiceError};
pub use user::{UserService, UserServiceError};
