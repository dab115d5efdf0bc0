// SPDX-License-Identifier: MPL-2.0

/// Blocking acknowledgment the shell shows to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub title: String,
    pub message: String,
}

impl Prompt {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn permission_required() -> Self {
        Self::new(
            "Permission required!",
            "We need access to your photos to upload images.",
        )
    }

    pub fn upload_succeeded() -> Self {
        Self::new("Success!", "Your post has been uploaded.")
    }

    pub fn upload_failed() -> Self {
        Self::new(
            "Upload Failed",
            "There was an error uploading your post. Please try again.",
        )
    }

    pub fn login_failed(message: &str) -> Self {
        Self::new("Login Failed", message)
    }

    pub fn account_created() -> Self {
        Self::new("Success", "Account created successfully!")
    }

    pub fn registration_failed(message: &str) -> Self {
        Self::new("Error", message)
    }
}
