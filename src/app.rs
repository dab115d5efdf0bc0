// SPDX-License-Identifier: MPL-2.0

//! Wires the backend clients into the flows a shell drives.

use crate::backend::{
    CloudinaryUploader, FirebaseAuth, FirestoreStore, IdentityProvider, MediaUploader,
    RemoteStore, SessionState,
};
use crate::flows::{Accounts, AuthGate, FeedSync, Navigator, ProfileAggregator, UploadFlow};
use crate::runtime;
use crate::state::{KeyringVault, Settings, SettingsError};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// The three external services everything else is built on.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn RemoteStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub uploader: Arc<dyn MediaUploader>,
}

pub struct ShutterApp {
    services: Services,
    /// Set when talking to Firebase; resumes the stored session on start
    firebase: Option<Arc<FirebaseAuth>>,
    upload: Arc<UploadFlow>,
    profile: Arc<ProfileAggregator>,
    accounts: Arc<Accounts>,
}

impl ShutterApp {
    pub fn new(services: Services) -> Self {
        let upload = Arc::new(UploadFlow::new(
            services.store.clone(),
            services.identity.clone(),
            services.uploader.clone(),
        ));
        let profile = Arc::new(ProfileAggregator::new(
            services.store.clone(),
            services.identity.clone(),
        ));
        let accounts = Arc::new(Accounts::new(
            services.store.clone(),
            services.identity.clone(),
        ));
        Self {
            services,
            firebase: None,
            upload,
            profile,
            accounts,
        }
    }

    /// Build the Firebase + Cloudinary stack from settings.
    pub fn connect(settings: &Settings) -> Result<Self, SettingsError> {
        settings.validate()?;

        let auth = Arc::new(FirebaseAuth::new(
            &settings.firebase.api_key,
            Arc::new(KeyringVault),
        ));
        let store = FirestoreStore::new(
            &settings.firebase.project_id,
            auth.clone(),
            settings.feed_poll_interval(),
        );
        let uploader = CloudinaryUploader::new(
            &settings.cloudinary.cloud_name,
            &settings.cloudinary.upload_preset,
        );

        let mut app = Self::new(Services {
            store: Arc::new(store),
            identity: auth.clone(),
            uploader: Arc::new(uploader),
        });
        app.firebase = Some(auth);
        Ok(app)
    }

    /// Start routing on session changes, then resume any stored session.
    /// The returned handle is the gate; abort it when the shell closes.
    pub fn start(&self, navigator: Arc<dyn Navigator>) -> JoinHandle<()> {
        let gate = AuthGate::new(self.services.identity.clone(), navigator);
        let handle = runtime::spawn(async move { gate.run().await });

        if let Some(auth) = self.firebase.clone() {
            runtime::spawn(async move {
                if let SessionState::SignedIn(principal) = auth.restore().await {
                    tracing::info!(uid = %principal.uid, "resumed stored session");
                }
            });
        }
        handle
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// A feed for one screen. Activate it when the screen is shown.
    pub fn feed(&self) -> FeedSync {
        FeedSync::new(self.services.store.clone(), self.services.identity.clone())
    }

    pub fn upload(&self) -> Arc<UploadFlow> {
        self.upload.clone()
    }

    pub fn profile(&self) -> Arc<ProfileAggregator> {
        self.profile.clone()
    }

    pub fn accounts(&self) -> Arc<Accounts> {
        self.accounts.clone()
    }

    /// Toggle a like without waiting for it. The feed shows the result when the
    /// next push arrives; a failure is only logged.
    pub fn like(
        &self,
        feed: &FeedSync,
        post_id: &str,
        liked_by: &BTreeSet<String>,
    ) -> JoinHandle<()> {
        let post_id = post_id.to_string();
        let toggle = feed.toggle_like(&post_id, liked_by);
        runtime::spawn(async move {
            if let Err(e) = toggle.await {
                tracing::warn!(post = %post_id, "like failed: {e}");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryStore, Post, Record};
    use crate::config::POSTS_COLLECTION;
    use crate::flows::Route;
    use crate::testing::{FakeIdentity, FakeUploader, RecordingNavigator, principal};
    use serde_json::json;

    fn app(store: &MemoryStore, identity: Arc<FakeIdentity>) -> ShutterApp {
        ShutterApp::new(Services {
            store: Arc::new(store.clone()),
            identity,
            uploader: Arc::new(FakeUploader::new("https://cdn/x.png")),
        })
    }

    #[test]
    fn test_connect_refuses_missing_credentials() {
        let mut settings = Settings::default();
        settings.firebase.api_key = String::new();
        assert!(matches!(
            ShutterApp::connect(&settings),
            Err(SettingsError::Missing("firebase.api_key"))
        ));
    }

    #[test]
    fn test_fire_and_forget_like_reaches_store() {
        let store = MemoryStore::new();
        store.insert_raw(
            POSTS_COLLECTION,
            Record::new(
                "p",
                json!({"userId": "a", "imageUrl": "https://cdn/p.jpg"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            ),
        );
        let app = app(
            &store,
            Arc::new(FakeIdentity::signed_in(principal("u1", Some("a@x.com")))),
        );
        let feed = app.feed();

        let handle = app.like(&feed, "p", &BTreeSet::new());
        drop(feed);
        runtime::block_on(handle).unwrap();

        let post = Post::from_record(&store.records(POSTS_COLLECTION)[0]).unwrap();
        assert!(post.is_liked_by("u1"));
    }

    #[test]
    fn test_failed_like_is_swallowed() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let app = app(
            &store,
            Arc::new(FakeIdentity::signed_in(principal("u1", Some("a@x.com")))),
        );
        let feed = app.feed();
        let handle = app.like(&feed, "p", &BTreeSet::new());
        assert!(runtime::block_on(handle).is_ok());
    }

    #[test]
    fn test_start_routes_current_session() {
        let store = MemoryStore::new();
        let identity = Arc::new(FakeIdentity::signed_out());
        let app = app(&store, identity.clone());
        let navigator = Arc::new(RecordingNavigator::default());

        let gate = app.start(navigator.clone());
        runtime::block_on(async {
            while navigator.routes().is_empty() {
                tokio::task::yield_now().await;
            }
        });
        assert_eq!(navigator.routes(), vec![Route::Welcome]);
        gate.abort();
    }
}
