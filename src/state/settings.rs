// SPDX-License-Identifier: MPL-2.0

use crate::config::{
    APP_ID, BUNDLED_CLOUDINARY_CLOUD, BUNDLED_CLOUDINARY_PRESET, BUNDLED_FIREBASE_API_KEY,
    BUNDLED_FIREBASE_PROJECT, DEFAULT_FEED_POLL_MS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("missing setting: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirebaseSettings {
    pub api_key: String,
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudinarySettings {
    pub cloud_name: String,
    /// Unsigned upload preset configured on the Cloudinary account
    pub upload_preset: String,
}

/// Backend credentials and tuning, persisted as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub firebase: FirebaseSettings,
    pub cloudinary: CloudinarySettings,
    /// Poll interval of the live feed subscription
    #[serde(default = "default_feed_poll_ms")]
    pub feed_poll_ms: u64,
}

fn default_feed_poll_ms() -> u64 {
    DEFAULT_FEED_POLL_MS
}

impl Default for Settings {
    /// Credentials bundled at build time; empty when none were.
    fn default() -> Self {
        Self {
            firebase: FirebaseSettings {
                api_key: BUNDLED_FIREBASE_API_KEY.unwrap_or_default().to_string(),
                project_id: BUNDLED_FIREBASE_PROJECT.unwrap_or_default().to_string(),
            },
            cloudinary: CloudinarySettings {
                cloud_name: BUNDLED_CLOUDINARY_CLOUD.unwrap_or_default().to_string(),
                upload_preset: BUNDLED_CLOUDINARY_PRESET.unwrap_or_default().to_string(),
            },
            feed_poll_ms: DEFAULT_FEED_POLL_MS,
        }
    }
}

impl Settings {
    /// Get the settings file path (~/.config/io.github.shutter.Shutter/settings.json)
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push(APP_ID);
            p.push("settings.json");
            p
        })
    }

    /// Load settings from disk, or return the bundled defaults if not found
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable settings at {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Fail early instead of sending requests with empty credentials
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.firebase.api_key.is_empty() {
            return Err(SettingsError::Missing("firebase.api_key"));
        }
        if self.firebase.project_id.is_empty() {
            return Err(SettingsError::Missing("firebase.project_id"));
        }
        if self.cloudinary.cloud_name.is_empty() {
            return Err(SettingsError::Missing("cloudinary.cloud_name"));
        }
        if self.cloudinary.upload_preset.is_empty() {
            return Err(SettingsError::Missing("cloudinary.upload_preset"));
        }
        Ok(())
    }

    pub fn feed_poll_interval(&self) -> Duration {
        Duration::from_millis(self.feed_poll_ms.max(250))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Settings {
        Settings {
            firebase: FirebaseSettings {
                api_key: "key".into(),
                project_id: "proj".into(),
            },
            cloudinary: CloudinarySettings {
                cloud_name: "cloud".into(),
                upload_preset: "preset".into(),
            },
            feed_poll_ms: 1_000,
        }
    }

    #[test]
    fn test_save_then_load_from_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        configured().save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), configured());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load_from(&dir.path().join("absent.json"));
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_poll_interval_defaults_when_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"firebase":{"api_key":"k","project_id":"p"},"cloudinary":{"cloud_name":"c","upload_preset":"u"}}"#,
        )
        .unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.feed_poll_ms, DEFAULT_FEED_POLL_MS);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_validate_names_first_missing_value() {
        let mut settings = configured();
        settings.cloudinary.upload_preset.clear();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Missing("cloudinary.upload_preset"))
        ));
    }
}
