//! Signed-in user identity
//!
//! The sync layer only needs a stable user id and to know whether sign-in
//! is still resolving. No identity pauses remote work rather than failing it.

use std::sync::Arc;

use tokio::sync::watch;

/// Current authentication state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityState {
    /// Sign-in status not yet known
    Loading,
    SignedOut,
    SignedIn { user_id: String },
}

impl IdentityState {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::SignedIn { user_id } => Some(user_id),
            _ => None,
        }
    }

    /// True once sign-in has resolved either way
    pub fn is_ready(&self) -> bool {
        !matches!(self, Self::Loading)
    }
}

/// Source of the signed-in user
pub trait IdentityProvider: Send + Sync {
    fn state(&self) -> IdentityState;

    fn user_id(&self) -> Option<String> {
        self.state().user_id().map(str::to_string)
    }
}

/// Type alias for a shared identity provider
pub type SharedIdentity = Arc<dyn IdentityProvider>;

/// Identity holder updated by the embedding application's auth flow
#[derive(Debug)]
pub struct SessionIdentity {
    state: watch::Sender<IdentityState>,
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionIdentity {
    /// Starts in `Loading`
    pub fn new() -> Self {
        let (state, _) = watch::channel(IdentityState::Loading);
        Self { state }
    }

    pub fn signed_in(user_id: &str) -> Self {
        let identity = Self::new();
        identity.sign_in(user_id);
        identity
    }

    pub fn sign_in(&self, user_id: &str) {
        self.state.send_replace(IdentityState::SignedIn {
            user_id: user_id.to_string(),
        });
    }

    pub fn sign_out(&self) {
        self.state.send_replace(IdentityState::SignedOut);
    }

    pub fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }

    /// Wait until sign-in has resolved
    pub async fn wait_ready(&self) -> IdentityState {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(IdentityState::is_ready).await {
            Ok(state) => state.clone(),
            Err(_) => self.state.borrow().clone(),
        };
        state
    }
}

impl IdentityProvider for SessionIdentity {
    fn state(&self) -> IdentityState {
        self.state.borrow().clone()
    }
}
