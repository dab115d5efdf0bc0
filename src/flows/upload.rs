// SPDX-License-Identifier: MPL-2.0

//! Pick an image, caption it, upload it and create the post.

use crate::backend::record::{FieldWrite, keys};
use crate::backend::{
    IdentityProvider, MediaUploader, Principal, RemoteStore, StoreError, UploadError,
};
use crate::config::{ANONYMOUS_AUTHOR, POSTS_COLLECTION, USERS_COLLECTION};
use crate::notice::Prompt;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

const FALLBACK_MIME_TYPE: &str = "image/jpeg";

/// An image chosen from the device library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    pub path: PathBuf,
}

impl LocalImage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
    }
}

/// Device photo library.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    async fn request_permission(&self) -> bool;

    /// `None` when the user cancelled the picker
    async fn pick_image(&self) -> Option<LocalImage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    ImageSelected,
    Uploading,
}

#[derive(Error, Debug)]
pub enum UploadFlowError {
    #[error("photo library access denied")]
    PermissionDenied,
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl UploadFlowError {
    pub fn prompt(&self) -> Prompt {
        match self {
            UploadFlowError::PermissionDenied => Prompt::permission_required(),
            _ => Prompt::upload_failed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing to submit, or a submit is already running
    Skipped,
    Posted { post_id: String, image_url: String },
}

impl SubmitOutcome {
    pub fn prompt(&self) -> Option<Prompt> {
        match self {
            SubmitOutcome::Skipped => None,
            SubmitOutcome::Posted { .. } => Some(Prompt::upload_succeeded()),
        }
    }
}

#[derive(Default)]
struct Draft {
    state: UploadState,
    image: Option<LocalImage>,
    caption: String,
}

/// Held from the start of a submit to its outcome.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct UploadFlow {
    store: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    uploader: Arc<dyn MediaUploader>,
    draft: Mutex<Draft>,
    in_flight: AtomicBool,
}

impl UploadFlow {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityProvider>,
        uploader: Arc<dyn MediaUploader>,
    ) -> Self {
        Self {
            store,
            identity,
            uploader,
            draft: Mutex::new(Draft::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    fn draft(&self) -> MutexGuard<'_, Draft> {
        self.draft.lock().expect("upload draft poisoned")
    }

    pub fn state(&self) -> UploadState {
        self.draft().state
    }

    pub fn image(&self) -> Option<LocalImage> {
        self.draft().image.clone()
    }

    pub fn caption(&self) -> String {
        self.draft().caption.clone()
    }

    pub fn set_caption(&self, text: &str) {
        self.draft().caption = text.to_string();
    }

    /// Share button state
    pub fn can_submit(&self) -> bool {
        let draft = self.draft();
        draft.state == UploadState::ImageSelected && !draft.caption.trim().is_empty()
    }

    /// Ask for library access and let the user pick. Returns whether an image
    /// was selected.
    pub async fn select_image(&self, library: &dyn MediaLibrary) -> Result<bool, UploadFlowError> {
        if self.state() == UploadState::Uploading {
            return Ok(false);
        }

        if !library.request_permission().await {
            let mut draft = self.draft();
            if draft.state != UploadState::Uploading {
                draft.image = None;
                draft.state = UploadState::Idle;
            }
            return Err(UploadFlowError::PermissionDenied);
        }

        let Some(image) = library.pick_image().await else {
            return Ok(false);
        };

        let mut draft = self.draft();
        if draft.state == UploadState::Uploading {
            return Ok(false);
        }
        draft.image = Some(image);
        draft.state = UploadState::ImageSelected;
        Ok(true)
    }

    /// Upload the selected image and create the post.
    ///
    /// On failure the image and caption are kept so the user can retry.
    pub async fn submit(&self) -> Result<SubmitOutcome, UploadFlowError> {
        let Some(me) = self.identity.current() else {
            return Ok(SubmitOutcome::Skipped);
        };
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            return Ok(SubmitOutcome::Skipped);
        };

        let (image, caption) = {
            let mut draft = self.draft();
            let caption = draft.caption.trim().to_string();
            match draft.image.clone() {
                Some(image) if !caption.is_empty() => {
                    draft.state = UploadState::Uploading;
                    (image, caption)
                }
                _ => return Ok(SubmitOutcome::Skipped),
            }
        };

        let result = self.publish(&me, &image, &caption).await;

        let mut draft = self.draft();
        match result {
            Ok((post_id, image_url)) => {
                tracing::info!(post = %post_id, "post published");
                *draft = Draft::default();
                Ok(SubmitOutcome::Posted { post_id, image_url })
            }
            Err(e) => {
                tracing::warn!("upload failed: {e}");
                draft.state = UploadState::ImageSelected;
                Err(e)
            }
        }
    }

    async fn publish(
        &self,
        me: &Principal,
        image: &LocalImage,
        caption: &str,
    ) -> Result<(String, String), UploadFlowError> {
        let data = tokio::fs::read(&image.path)
            .await
            .map_err(|e| UploadError::Read(e.to_string()))?;
        let (file_name, mime_type) = describe(image, &data);

        let image_url = self.uploader.upload(data, &file_name, mime_type).await?;

        let author_name = self.author_name(&me.uid).await;

        let writes = vec![
            FieldWrite::set(keys::USER_ID, me.uid.as_str()),
            FieldWrite::set(keys::USER_EMAIL, me.email.clone()),
            FieldWrite::set(keys::USER_NAME, author_name),
            FieldWrite::set(keys::IMAGE_URL, image_url.as_str()),
            FieldWrite::set(keys::CAPTION, caption),
            FieldWrite::server_time(keys::CREATED_AT),
            FieldWrite::set(keys::COMMENTS, Value::Array(Vec::new())),
        ];
        let post_id = self.store.create_record(POSTS_COLLECTION, writes).await?;
        Ok((post_id, image_url))
    }

    async fn author_name(&self, uid: &str) -> String {
        match self.store.get_record(USERS_COLLECTION, uid).await {
            Ok(Some(record)) => record.str_field(keys::NAME).map(str::to_string),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("could not read user record: {e}");
                None
            }
        }
        .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string())
    }
}

/// Name and MIME type to upload under. The sniffed format is only a hint:
/// anything `image` cannot identify (HEIC, for one) goes up as JPEG and the
/// media host works out the rest.
fn describe(image: &LocalImage, data: &[u8]) -> (String, &'static str) {
    match image::guess_format(data) {
        Ok(format) => {
            let name = image.file_name().unwrap_or_else(|| {
                let ext = format.extensions_str().first().copied().unwrap_or("img");
                format!("upload.{ext}")
            });
            (name, format.to_mime_type())
        }
        Err(_) => (
            image
                .file_name()
                .unwrap_or_else(|| "upload.jpg".to_string()),
            FALLBACK_MIME_TYPE,
        ),
    }
}
