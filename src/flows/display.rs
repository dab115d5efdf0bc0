// SPDX-License-Identifier: MPL-2.0

//! Text the feed and profile screens show, derived from posts.

use crate::backend::{Author, Comment, Post};
use crate::config::{GENERIC_USER, UNKNOWN_USER};
use unicode_segmentation::UnicodeSegmentation;

/// Part of an email address before the `@`.
pub fn email_local_part(email: &str) -> Option<&str> {
    email.split('@').next().filter(|local| !local.is_empty())
}

/// Stored display name, then email local-part, then `fallback`.
pub fn resolve_name(name: Option<&str>, email: Option<&str>, fallback: &str) -> String {
    name.filter(|n| !n.trim().is_empty())
        .or_else(|| email.and_then(email_local_part))
        .unwrap_or(fallback)
        .to_string()
}

impl Author {
    pub fn resolved_name(&self, fallback: &str) -> String {
        resolve_name(self.name.as_deref(), self.email.as_deref(), fallback)
    }
}

impl Post {
    /// Name in the post header
    pub fn author_label(&self) -> String {
        self.author.resolved_name(UNKNOWN_USER)
    }

    /// Name in front of the caption
    pub fn caption_label(&self) -> String {
        self.author.resolved_name(GENERIC_USER)
    }

    /// Letter in the avatar circle
    pub fn avatar_initial(&self) -> String {
        avatar_initial(self.author.name.as_deref().or(self.author.email.as_deref()))
    }

    /// "1 like", "N likes", or nothing when nobody liked it
    pub fn likes_label(&self) -> Option<String> {
        likes_label(self.like_count())
    }
}

impl Comment {
    pub fn author_label(&self) -> String {
        self.author.resolved_name(GENERIC_USER)
    }
}

pub fn likes_label(count: usize) -> Option<String> {
    match count {
        0 => None,
        1 => Some("1 like".to_string()),
        n => Some(format!("{n} likes")),
    }
}

/// First grapheme, upper-cased; "U" when there is nothing to show.
pub fn avatar_initial(source: Option<&str>) -> String {
    source
        .map(str::trim)
        .and_then(|s| s.graphemes(true).next())
        .map(str::to_uppercase)
        .unwrap_or_else(|| "U".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn post(name: Option<&str>, email: Option<&str>) -> Post {
        Post {
            id: "p1".into(),
            author: Author {
                id: "u1".into(),
                email: email.map(str::to_string),
                name: name.map(str::to_string),
            },
            image_url: "https://cdn/x.jpg".into(),
            caption: Some("hello".into()),
            created_at: None,
            liked_by: BTreeSet::new(),
            comments: vec![Comment {
                author: Author {
                    id: "u1".into(),
                    email: email.map(str::to_string),
                    name: name.map(str::to_string),
                },
                text: "hi".into(),
                created_at: None,
            }],
        }
    }

    #[test]
    fn test_email_local_part_used_at_every_site() {
        let post = post(None, Some("jane.doe@example.com"));
        assert_eq!(post.author_label(), "jane.doe");
        assert_eq!(post.caption_label(), "jane.doe");
        assert_eq!(post.comments[0].author_label(), "jane.doe");
    }

    #[test]
    fn test_stored_name_wins() {
        let post = post(Some("Jane"), Some("jane.doe@example.com"));
        assert_eq!(post.author_label(), "Jane");
    }

    #[test]
    fn test_fallbacks_differ_by_site() {
        let post = post(None, None);
        assert_eq!(post.author_label(), "Unknown user");
        assert_eq!(post.caption_label(), "user");
        assert_eq!(post.comments[0].author_label(), "user");
    }

    #[test]
    fn test_blank_name_and_bare_domain_fall_through() {
        assert_eq!(resolve_name(Some("  "), Some("@x.com"), "user"), "user");
    }

    #[test]
    fn test_likes_label() {
        assert_eq!(likes_label(0), None);
        assert_eq!(likes_label(1).as_deref(), Some("1 like"));
        assert_eq!(likes_label(7).as_deref(), Some("7 likes"));
    }

    #[test]
    fn test_avatar_initial() {
        assert_eq!(avatar_initial(Some("jane")), "J");
        assert_eq!(avatar_initial(Some("élodie")), "É");
        assert_eq!(avatar_initial(Some("")), "U");
        assert_eq!(avatar_initial(None), "U");
        assert_eq!(post(None, Some("bob@x.com")).avatar_initial(), "B");
    }
}
