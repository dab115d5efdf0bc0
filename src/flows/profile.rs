// SPDX-License-Identifier: MPL-2.0

//! The signed-in user's profile: name, email, own posts and likes received.

use crate::backend::record::{keys, posts_from_records, sort_newest_first};
use crate::backend::{IdentityProvider, Principal, RemoteStore, StoreError, UserProfile};
use crate::config::{GENERIC_USER, NO_EMAIL, POSTS_COLLECTION, USERS_COLLECTION};
use crate::flows::display::resolve_name;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ProfileLoad {
    #[default]
    NotLoaded,
    /// Nobody is signed in
    Anonymous,
    Loaded(UserProfile),
}

pub struct ProfileAggregator {
    store: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    current: Mutex<ProfileLoad>,
}

impl ProfileAggregator {
    pub fn new(store: Arc<dyn RemoteStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store,
            identity,
            current: Mutex::new(ProfileLoad::NotLoaded),
        }
    }

    pub async fn profile(&self) -> ProfileLoad {
        self.current.lock().await.clone()
    }

    /// Rebuild the profile from the store. Overlapping calls run one after the
    /// other. A failed load keeps whatever was shown before.
    pub async fn refresh(&self) -> ProfileLoad {
        let mut current = self.current.lock().await;

        let Some(me) = self.identity.current() else {
            *current = ProfileLoad::Anonymous;
            return ProfileLoad::Anonymous;
        };

        match self.load(&me).await {
            Ok(profile) => *current = ProfileLoad::Loaded(profile),
            Err(e) => tracing::warn!(uid = %me.uid, "profile refresh failed: {e}"),
        }
        current.clone()
    }

    async fn load(&self, me: &Principal) -> Result<UserProfile, StoreError> {
        let user = self.store.get_record(USERS_COLLECTION, &me.uid).await?;
        let stored_name = user
            .as_ref()
            .and_then(|record| record.str_field(keys::NAME));

        let records = self
            .store
            .query(POSTS_COLLECTION, keys::USER_ID, Value::from(me.uid.as_str()))
            .await?;
        let mut posts = posts_from_records(&records);
        sort_newest_first(&mut posts);

        Ok(UserProfile {
            name: resolve_name(stored_name, me.email.as_deref(), GENERIC_USER),
            email: me.email.clone().unwrap_or_else(|| NO_EMAIL.to_string()),
            posts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryStore, Record};
    use crate::testing::{FakeIdentity, principal};
    use serde_json::json;

    fn seed(store: &MemoryStore) {
        let post = |id: &str, uid: &str, at: &str, liked_by: Value| {
            Record::new(
                id,
                json!({
                    "userId": uid,
                    "imageUrl": format!("https://cdn/{id}.jpg"),
                    "createdAt": at,
                    "likedBy": liked_by,
                })
                .as_object()
                .cloned()
                .unwrap(),
            )
        };
        store.insert_raw("posts", post("a", "u1", "2024-01-01T00:00:00Z", json!(["u2"])));
        store.insert_raw("posts", post("b", "u2", "2024-02-01T00:00:00Z", json!(["u1"])));
        store.insert_raw(
            "posts",
            post("c", "u1", "2024-03-01T00:00:00Z", json!(["u2", "u3"])),
        );
    }

    fn aggregator(store: &MemoryStore, identity: FakeIdentity) -> ProfileAggregator {
        ProfileAggregator::new(Arc::new(store.clone()), Arc::new(identity))
    }

    #[tokio::test]
    async fn test_profile_counts_own_posts_and_likes() {
        let store = MemoryStore::new();
        seed(&store);
        store.insert_raw(
            "users",
            Record::new("u1", json!({"name": "Ann"}).as_object().cloned().unwrap()),
        );
        let profiles = aggregator(
            &store,
            FakeIdentity::signed_in(principal("u1", Some("ann@x.com"))),
        );

        let ProfileLoad::Loaded(profile) = profiles.refresh().await else {
            panic!("profile not loaded");
        };
        assert_eq!(profile.name, "Ann");
        assert_eq!(profile.email, "ann@x.com");
        assert_eq!(profile.post_count(), 2);
        assert_eq!(profile.total_likes(), 3);
        let ids: Vec<_> = profile.posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_name_and_email_fallbacks() {
        let store = MemoryStore::new();
        let profiles = aggregator(
            &store,
            FakeIdentity::signed_in(principal("u1", Some("jane.doe@example.com"))),
        );
        let ProfileLoad::Loaded(profile) = profiles.refresh().await else {
            panic!("profile not loaded");
        };
        assert_eq!(profile.name, "jane.doe");
        assert_eq!(profile.post_count(), 0);

        let profiles = aggregator(&store, FakeIdentity::signed_in(principal("u9", None)));
        let ProfileLoad::Loaded(profile) = profiles.refresh().await else {
            panic!("profile not loaded");
        };
        assert_eq!(profile.email, "No email");
    }

    #[tokio::test]
    async fn test_anonymous_is_distinct_from_not_loaded() {
        let store = MemoryStore::new();
        let profiles = aggregator(&store, FakeIdentity::signed_out());
        assert_eq!(profiles.profile().await, ProfileLoad::NotLoaded);
        assert_eq!(profiles.refresh().await, ProfileLoad::Anonymous);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_profile() {
        let store = MemoryStore::new();
        seed(&store);
        let profiles = aggregator(
            &store,
            FakeIdentity::signed_in(principal("u1", Some("ann@x.com"))),
        );
        let first = profiles.refresh().await;
        assert!(matches!(first, ProfileLoad::Loaded(_)));

        store.set_offline(true);
        assert_eq!(profiles.refresh().await, first);
        assert_eq!(profiles.profile().await, first);
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_both_complete() {
        let store = MemoryStore::new();
        seed(&store);
        let profiles = Arc::new(aggregator(
            &store,
            FakeIdentity::signed_in(principal("u1", Some("ann@x.com"))),
        ));
        let (a, b) = tokio::join!(profiles.refresh(), profiles.refresh());
        assert_eq!(a, b);
        assert!(matches!(profiles.profile().await, ProfileLoad::Loaded(_)));
    }
}
