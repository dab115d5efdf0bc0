// SPDX-License-Identifier: MPL-2.0

//! Live explore feed: one subscription on `posts`, likes and comments.
//!
//! The view is rebuilt from every push. Likes and comments go to the store first
//! and show up when the next push arrives; nothing is merged locally.

use crate::backend::record::{FieldWrite, keys, posts_from_records, sort_newest_first};
use crate::backend::{
    Author, Comment, IdentityProvider, Post, Record, RemoteStore, StoreError, Subscription,
};
use crate::config::{COLLAPSED_COMMENT_COUNT, POSTS_COLLECTION};
use crate::flows::display::email_local_part;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Which way a like toggle went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeChange {
    Liked,
    Unliked,
}

pub struct FeedSync {
    store: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    subscription: Option<Subscription>,
    posts: Vec<Post>,
    /// No push received since activation
    loading: bool,
    comment_draft: String,
    active_comment_post: Option<String>,
    expanded_comments_post: Option<String>,
}

impl FeedSync {
    pub fn new(store: Arc<dyn RemoteStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store,
            identity,
            subscription: None,
            posts: Vec::new(),
            loading: true,
            comment_draft: String::new(),
            active_comment_post: None,
            expanded_comments_post: None,
        }
    }

    /// Open the live subscription. Does nothing if one is already open.
    pub async fn activate(&mut self) -> Result<(), StoreError> {
        if self.subscription.is_some() {
            return Ok(());
        }
        self.loading = true;
        self.subscription = Some(self.store.subscribe(POSTS_COLLECTION).await?);
        Ok(())
    }

    /// Release the subscription; the last view stays readable.
    pub fn deactivate(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Wait for the next push and apply it. `false` once there is nothing left
    /// to wait for (never activated, or the subscription ended).
    pub async fn next_update(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };
        match subscription.next().await {
            Some(records) => {
                self.apply_snapshot(&records);
                true
            }
            None => {
                self.subscription = None;
                false
            }
        }
    }

    /// Replace the whole view with a pushed result set.
    pub fn apply_snapshot(&mut self, records: &[Record]) {
        let mut posts = posts_from_records(records);
        sort_newest_first(&mut posts);
        self.posts = posts;
        self.loading = false;
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn post(&self, id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether the signed-in user has liked `post` (drives the filled heart)
    pub fn is_liked_by_me(&self, post: &Post) -> bool {
        self.identity
            .current()
            .is_some_and(|me| post.is_liked_by(&me.uid))
    }

    /// Flip the current user's membership in `liked_by` on the store.
    ///
    /// `liked_by` is whatever the caller last rendered; no fresh read is made.
    /// The returned future owns everything it needs, so it can outlive the screen.
    pub fn toggle_like(
        &self,
        post_id: &str,
        liked_by: &BTreeSet<String>,
    ) -> impl Future<Output = Result<Option<LikeChange>, StoreError>> + Send + use<> {
        let store = Arc::clone(&self.store);
        let post_id = post_id.to_string();
        let request = self.identity.current().map(|me| {
            if liked_by.contains(&me.uid) {
                (FieldWrite::set_remove(keys::LIKED_BY, me.uid), LikeChange::Unliked)
            } else {
                (FieldWrite::set_add(keys::LIKED_BY, me.uid), LikeChange::Liked)
            }
        });

        async move {
            let Some((write, change)) = request else {
                return Ok(None);
            };
            store
                .update_record(POSTS_COLLECTION, &post_id, vec![write])
                .await?;
            Ok(Some(change))
        }
    }

    /// Append a comment by the current user. Skipped for blank text or a user
    /// without an email. Clears the draft and the comment target on success.
    pub async fn add_comment(
        &mut self,
        post_id: &str,
        text: &str,
    ) -> Result<Option<Comment>, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let Some(me) = self.identity.current() else {
            return Ok(None);
        };
        let Some(email) = me.email.clone() else {
            return Ok(None);
        };

        let name = me
            .display_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| email_local_part(&email).map(str::to_string));
        let comment = Comment {
            author: Author {
                id: me.uid,
                email: Some(email),
                name,
            },
            text: text.to_string(),
            created_at: Some(Utc::now()),
        };

        self.store
            .update_record(
                POSTS_COLLECTION,
                post_id,
                vec![FieldWrite::set_add(keys::COMMENTS, comment.to_value())],
            )
            .await?;

        self.comment_draft.clear();
        self.active_comment_post = None;
        Ok(Some(comment))
    }

    /// Send whatever is in the draft to the active comment target.
    pub async fn submit_comment_draft(&mut self) -> Result<Option<Comment>, StoreError> {
        let Some(post_id) = self.active_comment_post.clone() else {
            return Ok(None);
        };
        let draft = self.comment_draft.clone();
        self.add_comment(&post_id, &draft).await
    }

    pub fn comment_draft(&self) -> &str {
        &self.comment_draft
    }

    pub fn set_comment_draft(&mut self, text: &str) {
        self.comment_draft = text.to_string();
    }

    /// Send button state
    pub fn can_send_comment(&self) -> bool {
        !self.comment_draft.trim().is_empty()
    }

    pub fn active_comment_post(&self) -> Option<&str> {
        self.active_comment_post.as_deref()
    }

    /// Open the comment box on `post_id`, or close it if it is already open there.
    pub fn toggle_comment_box(&mut self, post_id: &str) {
        if self.active_comment_post.as_deref() == Some(post_id) {
            self.active_comment_post = None;
        } else {
            self.active_comment_post = Some(post_id.to_string());
        }
    }

    pub fn is_expanded(&self, post_id: &str) -> bool {
        self.expanded_comments_post.as_deref() == Some(post_id)
    }

    /// "View all" / "Show less"
    pub fn toggle_expanded(&mut self, post_id: &str) {
        if self.is_expanded(post_id) {
            self.expanded_comments_post = None;
        } else {
            self.expanded_comments_post = Some(post_id.to_string());
        }
    }

    pub fn visible_comments<'a>(&self, post: &'a Post) -> &'a [Comment] {
        if self.is_expanded(&post.id) {
            &post.comments
        } else {
            &post.comments[..post.comments.len().min(COLLAPSED_COMMENT_COUNT)]
        }
    }

    /// "View all N comments" while collapsed with more than fit
    pub fn view_all_label(&self, post: &Post) -> Option<String> {
        if post.comments.len() > COLLAPSED_COMMENT_COUNT && !self.is_expanded(&post.id) {
            Some(format!("View all {} comments", post.comments.len()))
        } else {
            None
        }
    }
}

impl Drop for FeedSync {
    fn drop(&mut self) {
        self.deactivate();
    }
}
