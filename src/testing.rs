// SPDX-License-Identifier: MPL-2.0

//! Test doubles for the external collaborators.

use crate::backend::{
    AuthError, IdentityProvider, MediaUploader, Principal, ProfileAttrs, SessionState,
    UploadError,
};
use crate::flows::{LocalImage, MediaLibrary, Navigator, Route};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::watch;

/// Smallest valid PNG: enough for format sniffing.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89,
];

pub fn principal(uid: &str, email: Option<&str>) -> Principal {
    Principal {
        uid: uid.to_string(),
        email: email.map(str::to_string),
        display_name: None,
    }
}

pub struct FakeIdentity {
    session: watch::Sender<SessionState>,
    pub reject_with: Mutex<Option<String>>,
    pub logouts: AtomicUsize,
}

impl FakeIdentity {
    pub fn new(state: SessionState) -> Self {
        let (session, _) = watch::channel(state);
        Self {
            session,
            reject_with: Mutex::new(None),
            logouts: AtomicUsize::new(0),
        }
    }

    pub fn signed_in(principal: Principal) -> Self {
        Self::new(SessionState::SignedIn(principal))
    }

    pub fn signed_out() -> Self {
        Self::new(SessionState::SignedOut)
    }

    pub fn publish(&self, state: SessionState) {
        self.session.send_replace(state);
    }

    pub fn reject_next(&self, message: &str) {
        *self.reject_with.lock().unwrap() = Some(message.to_string());
    }

    fn take_rejection(&self) -> Result<(), AuthError> {
        match self.reject_with.lock().unwrap().take() {
            Some(message) => Err(AuthError::Rejected(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn register(
        &self,
        email: &str,
        _password: &str,
        attrs: &ProfileAttrs,
    ) -> Result<Principal, AuthError> {
        self.take_rejection()?;
        let principal = Principal {
            uid: format!("uid-{email}"),
            email: Some(email.to_string()),
            display_name: attrs.display_name.clone(),
        };
        self.publish(SessionState::SignedIn(principal.clone()));
        Ok(principal)
    }

    async fn login(&self, email: &str, _password: &str) -> Result<Principal, AuthError> {
        self.take_rejection()?;
        let principal = principal(&format!("uid-{email}"), Some(email));
        self.publish(SessionState::SignedIn(principal.clone()));
        Ok(principal)
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        self.publish(SessionState::SignedOut);
        Ok(())
    }

    fn current(&self) -> Option<Principal> {
        self.session.borrow().principal().cloned()
    }

    fn observe(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }
}

/// Returns a fixed URL; can be told to fail or to wait for a go signal.
pub struct FakeUploader {
    pub url: String,
    pub fail: AtomicBool,
    pub uploads: Mutex<Vec<(usize, String, String)>>,
    pub gate: Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
}

impl FakeUploader {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            fail: AtomicBool::new(false),
            uploads: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    /// Hold the next upload until the returned sender fires
    pub fn hold(&self) -> tokio::sync::oneshot::Sender<()> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }
}

#[async_trait]
impl MediaUploader for FakeUploader {
    async fn upload(
        &self,
        data: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, UploadError> {
        self.uploads
            .lock()
            .unwrap()
            .push((data.len(), file_name.to_string(), mime_type.to_string()));

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(UploadError::Network("connection reset".into()));
        }
        Ok(self.url.clone())
    }
}

pub struct FakeLibrary {
    pub granted: bool,
    pub pick: Option<PathBuf>,
}

#[async_trait]
impl MediaLibrary for FakeLibrary {
    async fn request_permission(&self) -> bool {
        self.granted
    }

    async fn pick_image(&self) -> Option<LocalImage> {
        self.pick.clone().map(LocalImage::new)
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    pub routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn replace(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }
}
