// SPDX-License-Identifier: MPL-2.0

mod cloudinary;
mod firebase_auth;
mod firestore;
mod identity;
mod media;
pub mod memory;
pub mod record;
mod store;
mod types;

pub use cloudinary::CloudinaryUploader;
pub use firebase_auth::FirebaseAuth;
pub use firestore::FirestoreStore;
pub use identity::{AuthError, IdentityProvider, ProfileAttrs, TokenSource};
pub use media::{MediaUploader, UploadError};
pub use memory::MemoryStore;
pub use record::{FieldOp, FieldWrite, Record, RecordError};
pub use store::{RemoteStore, StoreError, Subscription};
pub use types::{Author, Comment, Post, Principal, SessionState, UserProfile};
