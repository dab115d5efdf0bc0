// SPDX-License-Identifier: MPL-2.0

//! Login, signup and logout.
//!
//! None of these navigate. The auth gate sees the session change and redirects.

use crate::backend::record::{FieldWrite, keys};
use crate::backend::{AuthError, IdentityProvider, Principal, ProfileAttrs, RemoteStore};
use crate::config::USERS_COLLECTION;
use crate::notice::Prompt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Please enter both email and password.")]
    MissingCredentials,
    #[error("Please fill all fields")]
    MissingFields,
    #[error("login failed: {0}")]
    Login(#[source] AuthError),
    #[error("registration failed: {0}")]
    Registration(#[source] AuthError),
    #[error("logout failed: {0}")]
    Logout(#[source] AuthError),
}

impl AccountError {
    pub fn prompt(&self) -> Prompt {
        match self {
            AccountError::MissingCredentials | AccountError::MissingFields => {
                Prompt::new("Error", self.to_string())
            }
            AccountError::Login(e) => Prompt::login_failed(&e.to_string()),
            AccountError::Registration(e) | AccountError::Logout(e) => {
                Prompt::registration_failed(&e.to_string())
            }
        }
    }
}

/// A freshly created account, signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub principal: Principal,
}

impl Registered {
    pub fn prompt(&self) -> Prompt {
        Prompt::account_created()
    }
}

pub struct Accounts {
    store: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl Accounts {
    pub fn new(store: Arc<dyn RemoteStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Principal, AccountError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AccountError::MissingCredentials);
        }
        self.identity
            .login(email, password)
            .await
            .map_err(AccountError::Login)
    }

    /// Create the identity, then its `users/{uid}` record. The account exists
    /// once the identity does; a failed record write is only logged.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Registered, AccountError> {
        let email = email.trim();
        let name = name.trim();
        if email.is_empty() || password.is_empty() || name.is_empty() {
            return Err(AccountError::MissingFields);
        }

        let attrs = ProfileAttrs {
            display_name: Some(name.to_string()),
        };
        let principal = self
            .identity
            .register(email, password, &attrs)
            .await
            .map_err(AccountError::Registration)?;

        let writes = vec![
            FieldWrite::set(keys::NAME, name),
            FieldWrite::set(keys::EMAIL, email),
            FieldWrite::server_time(keys::CREATED_AT),
        ];
        if let Err(e) = self
            .store
            .set_record(USERS_COLLECTION, &principal.uid, writes)
            .await
        {
            tracing::warn!(uid = %principal.uid, "could not write user record: {e}");
        }
        Ok(Registered { principal })
    }

    pub async fn logout(&self) -> Result<(), AccountError> {
        self.identity.logout().await.map_err(AccountError::Logout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;
    use crate::backend::memory::StoreCall;
    use crate::testing::FakeIdentity;
    use std::sync::atomic::Ordering;

    fn accounts(store: &MemoryStore, identity: Arc<FakeIdentity>) -> Accounts {
        Accounts::new(Arc::new(store.clone()), identity)
    }

    #[tokio::test]
    async fn test_register_writes_user_record() {
        let store = MemoryStore::new();
        let identity = Arc::new(FakeIdentity::signed_out());
        let accounts = accounts(&store, identity.clone());

        let registered = accounts
            .register(" ann@x.com ", "secret", "Ann")
            .await
            .unwrap();
        assert_eq!(
            registered.prompt(),
            Prompt::new("Success", "Account created successfully!")
        );
        let principal = registered.principal;
        assert_eq!(principal.display_name.as_deref(), Some("Ann"));
        assert_eq!(identity.current(), Some(principal.clone()));

        let users = store.records(USERS_COLLECTION);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, principal.uid);
        assert_eq!(users[0].fields["name"], "Ann");
        assert_eq!(users[0].fields["email"], "ann@x.com");
        assert!(users[0].fields.contains_key("createdAt"));
    }

    #[tokio::test]
    async fn test_register_survives_user_record_failure() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let accounts = accounts(&store, Arc::new(FakeIdentity::signed_out()));
        assert!(accounts.register("ann@x.com", "secret", "Ann").await.is_ok());
        assert!(matches!(store.calls()[0], StoreCall::Set { .. }));
    }

    #[tokio::test]
    async fn test_register_rejection_is_shown_verbatim() {
        let store = MemoryStore::new();
        let identity = Arc::new(FakeIdentity::signed_out());
        identity.reject_next("EMAIL_EXISTS");
        let accounts = accounts(&store, identity);

        let err = accounts
            .register("ann@x.com", "secret", "Ann")
            .await
            .unwrap_err();
        assert_eq!(err.prompt(), Prompt::new("Error", "EMAIL_EXISTS"));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_login_failure_prompt() {
        let store = MemoryStore::new();
        let identity = Arc::new(FakeIdentity::signed_out());
        identity.reject_next("INVALID_LOGIN_CREDENTIALS");
        let accounts = accounts(&store, identity);

        let err = accounts.login("ann@x.com", "wrong").await.unwrap_err();
        assert_eq!(
            err.prompt(),
            Prompt::new("Login Failed", "INVALID_LOGIN_CREDENTIALS")
        );
    }

    #[tokio::test]
    async fn test_empty_fields_never_reach_the_provider() {
        let store = MemoryStore::new();
        let identity = Arc::new(FakeIdentity::signed_out());
        let accounts = accounts(&store, identity.clone());

        let err = accounts.login("", "secret").await.unwrap_err();
        assert_eq!(
            err.prompt(),
            Prompt::new("Error", "Please enter both email and password.")
        );
        let err = accounts.register("ann@x.com", "secret", " ").await.unwrap_err();
        assert_eq!(err.prompt(), Prompt::new("Error", "Please fill all fields"));
        assert_eq!(identity.current(), None);
    }

    #[tokio::test]
    async fn test_logout_only_invalidates_session() {
        let store = MemoryStore::new();
        let identity = Arc::new(FakeIdentity::signed_out());
        let accounts = accounts(&store, identity.clone());
        accounts.login("ann@x.com", "secret").await.unwrap();

        accounts.logout().await.unwrap();
        assert_eq!(identity.logouts.load(Ordering::SeqCst), 1);
        assert_eq!(identity.current(), None);
        assert!(store.calls().is_empty());
    }
}
