// SPDX-License-Identifier: MPL-2.0

use crate::backend::types::{Principal, SessionState};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Provider message, passed through to the user as-is
    #[error("{0}")]
    Rejected(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Attributes attached to a new account.
#[derive(Debug, Clone, Default)]
pub struct ProfileAttrs {
    pub display_name: Option<String>,
}

/// Managed authentication. Owns the session; everyone else observes it.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn register(
        &self,
        email: &str,
        password: &str,
        attrs: &ProfileAttrs,
    ) -> Result<Principal, AuthError>;

    async fn login(&self, email: &str, password: &str) -> Result<Principal, AuthError>;

    async fn logout(&self) -> Result<(), AuthError>;

    fn current(&self) -> Option<Principal>;

    /// Receives every session transition, starting with the current state.
    fn observe(&self) -> watch::Receiver<SessionState>;
}

/// Bearer token for authenticated store requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn id_token(&self) -> Option<String>;
}
