// SPDX-License-Identifier: MPL-2.0

pub const APP_ID: &str = "io.github.shutter.Shutter";
pub const APP_NAME: &str = "Shutter";

#[cfg(feature = "devel")]
pub const IS_DEVEL: bool = true;
#[cfg(not(feature = "devel"))]
pub const IS_DEVEL: bool = false;

pub const POSTS_COLLECTION: &str = "posts";
pub const USERS_COLLECTION: &str = "users";

/// Name shown in a post header when neither a display name nor an email is known
pub const UNKNOWN_USER: &str = "Unknown user";
/// Name shown next to captions and comments when nothing better is known
pub const GENERIC_USER: &str = "user";
/// Author name stored on a post when the user record has no name
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";
pub const NO_EMAIL: &str = "No email";

/// Comments shown under a post before "View all N comments"
pub const COLLAPSED_COMMENT_COUNT: usize = 2;

/// How often the REST store re-reads a subscribed collection
pub const DEFAULT_FEED_POLL_MS: u64 = 3_000;

pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";
pub const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
pub const CLOUDINARY_URL: &str = "https://api.cloudinary.com/v1_1";

/// Backend credentials bundled at build time. Settings on disk override them.
pub const BUNDLED_FIREBASE_API_KEY: Option<&str> = option_env!("SHUTTER_FIREBASE_API_KEY");
pub const BUNDLED_FIREBASE_PROJECT: Option<&str> = option_env!("SHUTTER_FIREBASE_PROJECT");
pub const BUNDLED_CLOUDINARY_CLOUD: Option<&str> = option_env!("SHUTTER_CLOUDINARY_CLOUD");
pub const BUNDLED_CLOUDINARY_PRESET: Option<&str> = option_env!("SHUTTER_CLOUDINARY_PRESET");
