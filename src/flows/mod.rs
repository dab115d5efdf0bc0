// SPDX-License-Identifier: MPL-2.0

mod account;
mod auth_gate;
pub mod display;
mod profile;
mod sync;
mod upload;

pub use account::{AccountError, Accounts, Registered};
pub use auth_gate::{AuthGate, AuthState, Navigator, Route};
pub use profile::{ProfileAggregator, ProfileLoad};
pub use sync::{FeedSync, LikeChange};
pub use upload::{
    LocalImage, MediaLibrary, SubmitOutcome, UploadFlow, UploadFlowError, UploadState,
};
