// SPDX-License-Identifier: MPL-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The currently authenticated identity.
///
/// Owned by the identity provider; the rest of the app only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Session as published by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// The provider has not finished its persisted-session check yet
    #[default]
    Pending,
    SignedIn(Principal),
    SignedOut,
}

impl SessionState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            SessionState::SignedIn(principal) => Some(principal),
            _ => None,
        }
    }
}

/// Who wrote a post or comment, as denormalized onto the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub author: Author,
    pub text: String,
    /// Client clock at submission
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub author: Author,
    pub image_url: String,
    pub caption: Option<String>,
    /// Server clock at creation; the only sort key for feeds
    pub created_at: Option<DateTime<Utc>>,
    pub liked_by: BTreeSet<String>,
    /// Append-only, insertion order is display order
    pub comments: Vec<Comment>,
}

impl Post {
    pub fn like_count(&self) -> usize {
        self.liked_by.len()
    }

    pub fn is_liked_by(&self, uid: &str) -> bool {
        self.liked_by.contains(uid)
    }
}

/// Profile screen projection, rebuilt on every refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub posts: Vec<Post>,
}

impl UserProfile {
    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    /// Likes received across all of the user's posts
    pub fn total_likes(&self) -> usize {
        self.posts.iter().map(Post::like_count).sum()
    }
}
