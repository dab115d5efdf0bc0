// SPDX-License-Identifier: MPL-2.0

//! Firebase Authentication over the Identity Toolkit REST API.
//!
//! Holds the ID/refresh token pair, persists the refresh token through a
//! `SessionVault` so a restart can resume the session, and publishes every
//! transition on a watch channel.

use crate::backend::identity::{AuthError, IdentityProvider, ProfileAttrs, TokenSource};
use crate::backend::types::{Principal, SessionState};
use crate::config::{IDENTITY_TOOLKIT_URL, SECURE_TOKEN_URL};
use crate::state::{SessionError, SessionVault, StoredSession};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, watch};
use url::Url;

/// Refresh this long before the provider's stated expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Response of `accounts:signUp` and `accounts:signInWithPassword`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

/// Response of the secure token endpoint (snake_case, unlike the rest).
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

struct Tokens {
    uid: String,
    id_token: String,
    refresh_token: String,
    expires_at: Instant,
}

impl Tokens {
    fn is_stale(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

fn expires_at(expires_in: Option<&str>) -> Instant {
    let secs = expires_in
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    Instant::now() + Duration::from_secs(secs)
}

/// Pull the provider's message out of an error body, verbatim.
fn error_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub struct FirebaseAuth {
    http: reqwest::Client,
    api_key: String,
    vault: Arc<dyn SessionVault>,
    tokens: Mutex<Option<Tokens>>,
    session: watch::Sender<SessionState>,
}

impl FirebaseAuth {
    pub fn new(api_key: &str, vault: Arc<dyn SessionVault>) -> Self {
        let (session, _) = watch::channel(SessionState::Pending);
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            vault,
            tokens: Mutex::new(None),
            session,
        }
    }

    fn endpoint(&self, base: &str) -> Result<Url, AuthError> {
        let mut url = Url::parse(base).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    fn account_endpoint(&self, method: &str) -> Result<Url, AuthError> {
        self.endpoint(&format!("{IDENTITY_TOOLKIT_URL}/accounts:{method}"))
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, AuthError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        let parsed = serde_json::from_str::<Value>(&text);

        if status.is_success() {
            return parsed.map_err(|e| AuthError::InvalidResponse(e.to_string()));
        }
        // Provider outages are not a verdict on the credentials
        if status.is_server_error() {
            return Err(AuthError::Network(status.to_string()));
        }
        let body = parsed.unwrap_or(Value::Null);
        Err(AuthError::Rejected(
            error_message(&body).unwrap_or_else(|| status.to_string()),
        ))
    }

    async fn post_account(&self, method: &str, body: Value) -> Result<Value, AuthError> {
        let response = self
            .http
            .post(self.account_endpoint(method)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        Self::read_json(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AuthError> {
        let response = self
            .http
            .post(self.endpoint(SECURE_TOKEN_URL)?)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let body = Self::read_json(response).await?;
        serde_json::from_value(body).map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }

    /// Adopt a fresh sign-in: keep the tokens, persist, announce.
    async fn establish(&self, account: AccountResponse) -> Principal {
        let principal = Principal {
            uid: account.local_id.clone(),
            email: account.email,
            display_name: account.display_name.filter(|n| !n.is_empty()),
        };

        *self.tokens.lock().await = Some(Tokens {
            uid: account.local_id,
            id_token: account.id_token,
            expires_at: expires_at(account.expires_in.as_deref()),
            refresh_token: account.refresh_token.clone(),
        });

        let stored = StoredSession {
            uid: principal.uid.clone(),
            email: principal.email.clone(),
            display_name: principal.display_name.clone(),
            refresh_token: account.refresh_token,
        };
        if let Err(e) = self.vault.store(&stored).await {
            tracing::warn!("failed to persist session: {e}");
        }

        tracing::info!(uid = %principal.uid, "signed in");
        self.session
            .send_replace(SessionState::SignedIn(principal.clone()));
        principal
    }

    /// Resume a persisted session at cold start, then publish the outcome.
    ///
    /// A rejected refresh token ends the session; an unreachable provider keeps
    /// it and retries the refresh on the next token request.
    pub async fn restore(&self) -> SessionState {
        let state = match self.vault.load().await {
            Ok(stored) => match self.refresh(&stored.refresh_token).await {
                Ok(fresh) => {
                    *self.tokens.lock().await = Some(Tokens {
                        uid: stored.uid.clone(),
                        id_token: fresh.id_token,
                        expires_at: expires_at(fresh.expires_in.as_deref()),
                        refresh_token: fresh.refresh_token,
                    });
                    SessionState::SignedIn(principal_of(&stored))
                }
                Err(AuthError::Network(e)) => {
                    tracing::warn!("could not refresh restored session: {e}");
                    *self.tokens.lock().await = Some(Tokens {
                        uid: stored.uid.clone(),
                        id_token: String::new(),
                        expires_at: Instant::now(),
                        refresh_token: stored.refresh_token.clone(),
                    });
                    SessionState::SignedIn(principal_of(&stored))
                }
                Err(e) => {
                    tracing::info!("stored session no longer valid: {e}");
                    if let Err(e) = self.vault.clear().await {
                        tracing::warn!("failed to clear stale session: {e}");
                    }
                    SessionState::SignedOut
                }
            },
            Err(SessionError::NotFound) => SessionState::SignedOut,
            Err(e) => {
                tracing::warn!("could not load stored session: {e}");
                SessionState::SignedOut
            }
        };

        self.session.send_replace(state.clone());
        state
    }
}

fn principal_of(stored: &StoredSession) -> Principal {
    Principal {
        uid: stored.uid.clone(),
        email: stored.email.clone(),
        display_name: stored.display_name.clone(),
    }
}

fn parse_account(body: Value) -> Result<AccountResponse, AuthError> {
    serde_json::from_value(body).map_err(|e| AuthError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn register(
        &self,
        email: &str,
        password: &str,
        attrs: &ProfileAttrs,
    ) -> Result<Principal, AuthError> {
        let body = self
            .post_account(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let mut account = parse_account(body)?;

        if let Some(name) = attrs.display_name.as_deref().filter(|n| !n.is_empty()) {
            let update = self
                .post_account(
                    "update",
                    json!({
                        "idToken": account.id_token,
                        "displayName": name,
                        "returnSecureToken": false,
                    }),
                )
                .await;
            match update {
                Ok(_) => account.display_name = Some(name.to_string()),
                Err(e) => tracing::warn!("account created but display name not set: {e}"),
            }
        }

        Ok(self.establish(account).await)
    }

    async fn login(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let body = self
            .post_account(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let account = parse_account(body)?;
        Ok(self.establish(account).await)
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.tokens.lock().await.take();
        if let Err(e) = self.vault.clear().await {
            tracing::warn!("failed to clear stored session: {e}");
        }
        tracing::info!("signed out");
        self.session.send_replace(SessionState::SignedOut);
        Ok(())
    }

    fn current(&self) -> Option<Principal> {
        self.session.borrow().principal().cloned()
    }

    fn observe(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }
}

#[async_trait]
impl TokenSource for FirebaseAuth {
    async fn id_token(&self) -> Option<String> {
        let mut guard = self.tokens.lock().await;
        let tokens = guard.as_mut()?;

        if tokens.is_stale() {
            match self.refresh(&tokens.refresh_token).await {
                Ok(fresh) => {
                    tokens.id_token = fresh.id_token;
                    tokens.refresh_token = fresh.refresh_token;
                    tokens.expires_at = expires_at(fresh.expires_in.as_deref());
                }
                Err(e) => {
                    tracing::warn!(uid = %tokens.uid, "token refresh failed: {e}");
                    return None;
                }
            }
        }

        Some(tokens.id_token.clone())
    }
}
