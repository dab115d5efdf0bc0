// SPDX-License-Identifier: MPL-2.0

mod session;
pub mod settings;

pub use session::{KeyringVault, MemoryVault, SessionError, SessionVault, StoredSession};
pub use settings::{CloudinarySettings, FirebaseSettings, Settings, SettingsError};
