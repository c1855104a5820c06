//! Blogfront - the public pages of a small multi-author blog
//!
//! Posts are ranked by likes, grouped by tags and listed with their comment
//! counts. Pages are rendered server-side from Tera templates.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
