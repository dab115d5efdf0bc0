// SPDX-License-Identifier: MPL-2.0

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("network error: {0}")]
    Network(String),
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("could not read image: {0}")]
    Read(String),
}

/// Image hosting service. Returns a publicly fetchable URL.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(
        &self,
        data: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, UploadError>;
}
