// SPDX-License-Identifier: MPL-2.0

use crate::config::APP_ID;
use async_trait::async_trait;
use secret_service::{EncryptionType, SecretService};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

const SECRET_LABEL: &str = "Shutter Session";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("secret service unavailable: {0}")]
    SecretService(String),
    #[error("session not found")]
    NotFound,
    #[error("invalid session data: {0}")]
    InvalidData(String),
}

/// What survives an app restart: enough to mint a fresh ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub refresh_token: String,
}

#[async_trait]
pub trait SessionVault: Send + Sync {
    async fn store(&self, session: &StoredSession) -> Result<(), SessionError>;
    async fn load(&self) -> Result<StoredSession, SessionError>;
    async fn clear(&self) -> Result<(), SessionError>;
}

/// Persists the session in the desktop keyring via libsecret.
pub struct KeyringVault;

#[async_trait]
impl SessionVault for KeyringVault {
    async fn store(&self, session: &StoredSession) -> Result<(), SessionError> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;
        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        if collection.is_locked().await.unwrap_or(true) {
            collection
                .unlock()
                .await
                .map_err(|e| SessionError::SecretService(e.to_string()))?;
        }

        let session_json =
            serde_json::to_string(session).map_err(|e| SessionError::InvalidData(e.to_string()))?;

        let attributes = vec![("application", APP_ID), ("uid", session.uid.as_str())];

        collection
            .create_item(
                SECRET_LABEL,
                attributes.into_iter().collect(),
                session_json.as_bytes(),
                true, // replace existing
                "text/plain",
            )
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        Ok(())
    }

    async fn load(&self) -> Result<StoredSession, SessionError> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;
        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        if collection.is_locked().await.unwrap_or(true) {
            collection
                .unlock()
                .await
                .map_err(|e| SessionError::SecretService(e.to_string()))?;
        }

        let attributes = vec![("application", APP_ID)];
        let items = collection
            .search_items(attributes.into_iter().collect())
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        let item = items.first().ok_or(SessionError::NotFound)?;

        let secret = item
            .get_secret()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        serde_json::from_slice(&secret).map_err(|e| SessionError::InvalidData(e.to_string()))
    }

    async fn clear(&self) -> Result<(), SessionError> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;
        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        if collection.is_locked().await.unwrap_or(true) {
            collection
                .unlock()
                .await
                .map_err(|e| SessionError::SecretService(e.to_string()))?;
        }

        let attributes = vec![("application", APP_ID)];
        let items = collection
            .search_items(attributes.into_iter().collect())
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        for item in items {
            item.delete()
                .await
                .map_err(|e| SessionError::SecretService(e.to_string()))?;
        }

        Ok(())
    }
}

/// Session that lives only as long as the process.
#[derive(Default)]
pub struct MemoryVault {
    session: Mutex<Option<StoredSession>>,
}

#[async_trait]
impl SessionVault for MemoryVault {
    async fn store(&self, session: &StoredSession) -> Result<(), SessionError> {
        *self.session.lock().expect("vault lock poisoned") = Some(session.clone());
        Ok(())
    }

    async fn load(&self) -> Result<StoredSession, SessionError> {
        self.session
            .lock()
            .expect("vault lock poisoned")
            .clone()
            .ok_or(SessionError::NotFound)
    }

    async fn clear(&self) -> Result<(), SessionError> {
        *self.session.lock().expect("vault lock poisoned") = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_vault_round_trip_and_clear() {
        let vault = MemoryVault::default();
        assert!(matches!(vault.load().await, Err(SessionError::NotFound)));

        let session = StoredSession {
            uid: "u1".into(),
            email: Some("a@x.com".into()),
            display_name: None,
            refresh_token: "refresh".into(),
        };
        vault.store(&session).await.unwrap();
        assert_eq!(vault.load().await.unwrap(), session);

        vault.clear().await.unwrap();
        assert!(vault.load().await.is_err());
    }
}
