//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A registered user.
///
/// Staff users may author posts; any user may comment and like.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    /// Username (unique)
    pub username: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new User. The ID is assigned by the database.
    pub fn new(username: String, is_staff: bool) -> Self {
        Self {
            id: 0,
            username,
            is_staff,
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}
