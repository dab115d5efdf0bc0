// SPDX-License-Identifier: MPL-2.0

use crate::backend::media::{MediaUploader, UploadError};
use crate::config::CLOUDINARY_URL;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use url::Url;

/// Unsigned uploads to Cloudinary using an upload preset.
pub struct CloudinaryUploader {
    http: reqwest::Client,
    cloud_name: String,
    upload_preset: String,
}

impl CloudinaryUploader {
    pub fn new(cloud_name: &str, upload_preset: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            cloud_name: cloud_name.to_string(),
            upload_preset: upload_preset.to_string(),
        }
    }

    fn upload_url(&self) -> Result<Url, UploadError> {
        let mut url =
            Url::parse(CLOUDINARY_URL).map_err(|e| UploadError::InvalidResponse(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| UploadError::InvalidResponse("cannot-be-a-base upload URL".into()))?
            .extend([self.cloud_name.as_str(), "image", "upload"]);
        Ok(url)
    }
}

/// Pick the public URL out of an upload response.
fn secure_url(body: &Value) -> Result<String, UploadError> {
    if let Some(message) = body
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    {
        return Err(UploadError::Rejected(message.to_string()));
    }

    body.get("secure_url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| UploadError::InvalidResponse("response has no secure_url".into()))
}

#[async_trait]
impl MediaUploader for CloudinaryUploader {
    async fn upload(
        &self,
        data: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, UploadError> {
        let file = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| UploadError::Rejected(e.to_string()))?;
        let form = Form::new()
            .part("file", file)
            .text("upload_preset", self.upload_preset.clone());

        let response = self
            .http
            .post(self.upload_url()?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| UploadError::InvalidResponse(e.to_string()))?;

        match secure_url(&body) {
            Ok(url) if status.is_success() => Ok(url),
            Ok(_) => Err(UploadError::Rejected(status.to_string())),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upload_url_includes_cloud_name() {
        let uploader = CloudinaryUploader::new("demo", "unsigned");
        assert_eq!(
            uploader.upload_url().unwrap().as_str(),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }

    #[test]
    fn test_secure_url_extracted() {
        let body = json!({
            "public_id": "abc",
            "url": "http://res.cloudinary.com/demo/image/upload/abc.jpg",
            "secure_url": "https://res.cloudinary.com/demo/image/upload/abc.jpg"
        });
        assert_eq!(
            secure_url(&body).unwrap(),
            "https://res.cloudinary.com/demo/image/upload/abc.jpg"
        );
    }

    #[test]
    fn test_error_body_is_rejected() {
        let body = json!({ "error": { "message": "Upload preset not found" } });
        assert!(matches!(
            secure_url(&body),
            Err(UploadError::Rejected(message)) if message == "Upload preset not found"
        ));
    }
}
