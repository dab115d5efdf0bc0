// SPDX-License-Identifier: MPL-2.0

//! Routes between the signed-in area and the welcome screen.
//!
//! The gate is the only thing that navigates on session changes. Login and
//! logout only change the session; the redirect follows from the transition.

use crate::backend::{IdentityProvider, Principal, SessionState};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Signed-in tab area, landing on the feed
    Feed,
    Welcome,
}

/// Shell navigation. Replaces the current screen, leaving no back entry.
pub trait Navigator: Send + Sync {
    fn replace(&self, route: Route);
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unknown,
    Authenticated(Principal),
    Anonymous,
}

impl AuthState {
    fn from_session(session: &SessionState) -> Option<Self> {
        match session {
            SessionState::Pending => None,
            SessionState::SignedIn(principal) => Some(AuthState::Authenticated(principal.clone())),
            SessionState::SignedOut => Some(AuthState::Anonymous),
        }
    }

    fn route(&self) -> Option<Route> {
        match self {
            AuthState::Unknown => None,
            AuthState::Authenticated(_) => Some(Route::Feed),
            AuthState::Anonymous => Some(Route::Welcome),
        }
    }
}

pub struct AuthGate {
    identity: Arc<dyn IdentityProvider>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<AuthState>,
}

impl AuthGate {
    pub fn new(identity: Arc<dyn IdentityProvider>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            identity,
            navigator,
            state: Mutex::new(AuthState::Unknown),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.lock().expect("auth state poisoned").clone()
    }

    /// Apply one session value. Redirects once per actual transition; a
    /// repeated value or a still-pending session does nothing.
    pub fn apply(&self, session: &SessionState) -> Option<Route> {
        let next = AuthState::from_session(session)?;
        {
            let mut state = self.state.lock().expect("auth state poisoned");
            if *state == next {
                return None;
            }
            *state = next.clone();
        }

        match &next {
            AuthState::Authenticated(principal) => {
                tracing::info!(uid = %principal.uid, "signed in");
            }
            _ => tracing::info!("signed out"),
        }

        let route = next.route()?;
        self.navigator.replace(route);
        Some(route)
    }

    /// Follow session transitions until the identity provider goes away.
    pub async fn run(&self) {
        let mut session = self.identity.observe();
        loop {
            let current = session.borrow_and_update().clone();
            self.apply(&current);
            if session.changed().await.is_err() {
                break;
            }
        }
    }
}
