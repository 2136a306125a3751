//! Client-side session cache.
//!
//! Holds the current session state and exposes it reactively through a watch
//! channel, so UI code subscribes instead of polling a global. The machine is
//! `Unknown → Loading → Authenticated | Unauthenticated`; only the settled
//! `Unauthenticated` state may trigger a redirect.

use super::{AuthClient, ClientError};
use crate::api::handlers::auth::{SignInRequest, SignUpRequest, UserResponse};
use tokio::sync::{watch, Mutex};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing is known yet; no resolution has been attempted.
    Unknown,
    /// A resolution is in flight. Render a placeholder, never redirect.
    Loading,
    Authenticated(UserResponse),
    Unauthenticated,
}

impl SessionState {
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Authenticated(_) | Self::Unauthenticated)
    }

    /// Redirecting while the state is still `Unknown`/`Loading` would bounce
    /// signed-in users off protected views mid-resolution.
    #[must_use]
    pub fn should_redirect(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserResponse> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

pub struct SessionCache {
    client: AuthClient,
    token: Mutex<Option<String>>,
    state: watch::Sender<SessionState>,
}

impl SessionCache {
    #[must_use]
    pub fn new(client: AuthClient) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            client,
            token: Mutex::new(None),
            state,
        }
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// The current raw session token, if any.
    pub async fn token(&self) -> Option<String> {
        self.token.lock().await.clone()
    }

    /// # Errors
    /// Propagates the service/transport error; the cache settles to
    /// `Unauthenticated` on a rejected sign-up.
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<UserResponse, ClientError> {
        self.set_state(SessionState::Loading);
        match self.client.sign_up(request).await {
            Ok(success) => {
                *self.token.lock().await = Some(success.token);
                self.set_state(SessionState::Authenticated(success.user.clone()));
                Ok(success.user)
            }
            Err(err) => {
                self.set_state(SessionState::Unauthenticated);
                Err(err)
            }
        }
    }

    /// # Errors
    /// Propagates the service/transport error; the cache settles to
    /// `Unauthenticated` on rejected credentials.
    pub async fn sign_in(&self, request: &SignInRequest) -> Result<UserResponse, ClientError> {
        self.set_state(SessionState::Loading);
        match self.client.sign_in(request).await {
            Ok(success) => {
                *self.token.lock().await = Some(success.token);
                self.set_state(SessionState::Authenticated(success.user.clone()));
                Ok(success.user)
            }
            Err(err) => {
                self.set_state(SessionState::Unauthenticated);
                Err(err)
            }
        }
    }

    /// Invalidate the local session, then the server-side one.
    ///
    /// The cache settles to `Unauthenticated` even when the network call
    /// fails; the token is already discarded locally.
    ///
    /// # Errors
    /// Propagates transport errors from the sign-out request.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        let token = self.token.lock().await.take();
        self.set_state(SessionState::Unauthenticated);
        if let Some(token) = token {
            self.client.sign_out(&token).await?;
        }
        Ok(())
    }

    /// Resolve the held token against the service, e.g. on mount.
    ///
    /// Settles to `Authenticated` or `Unauthenticated`. A transport error
    /// restores the previous state instead of settling, so a network blip
    /// cannot cause a premature redirect.
    ///
    /// # Errors
    /// Returns the transport error when the service cannot be reached.
    pub async fn refresh(&self) -> Result<SessionState, ClientError> {
        let previous = self.state();
        self.set_state(SessionState::Loading);

        let token = self.token.lock().await.clone();
        let Some(token) = token else {
            self.set_state(SessionState::Unauthenticated);
            return Ok(SessionState::Unauthenticated);
        };

        match self.client.session(&token).await {
            Ok(Some(session)) => {
                let next = SessionState::Authenticated(session.user);
                self.set_state(next.clone());
                Ok(next)
            }
            Ok(None) => {
                self.token.lock().await.take();
                self.set_state(SessionState::Unauthenticated);
                Ok(SessionState::Unauthenticated)
            }
            Err(err) => {
                self.set_state(previous);
                Err(err)
            }
        }
    }

    fn set_state(&self, next: SessionState) {
        self.state.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> SessionCache {
        let client = AuthClient::new("http://localhost:9").expect("client should build");
        SessionCache::new(client)
    }

    #[test]
    fn initial_state_is_unknown() {
        let cache = cache();
        assert_eq!(cache.state(), SessionState::Unknown);
    }

    #[test]
    fn only_unauthenticated_redirects() {
        let user = UserResponse {
            id: "id".to_string(),
            email: "a@x.com".to_string(),
            name: None,
        };
        assert!(!SessionState::Unknown.should_redirect());
        assert!(!SessionState::Loading.should_redirect());
        assert!(!SessionState::Authenticated(user).should_redirect());
        assert!(SessionState::Unauthenticated.should_redirect());
    }

    #[test]
    fn settled_states() {
        let user = UserResponse {
            id: "id".to_string(),
            email: "a@x.com".to_string(),
            name: None,
        };
        assert!(!SessionState::Unknown.is_settled());
        assert!(!SessionState::Loading.is_settled());
        assert!(SessionState::Authenticated(user).is_settled());
        assert!(SessionState::Unauthenticated.is_settled());
    }

    #[tokio::test]
    async fn refresh_without_token_settles_unauthenticated() -> Result<(), ClientError> {
        let cache = cache();
        let state = cache.refresh().await?;
        assert_eq!(state, SessionState::Unauthenticated);
        assert_eq!(cache.state(), SessionState::Unauthenticated);
        Ok(())
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let cache = cache();
        let mut rx = cache.subscribe();

        cache.set_state(SessionState::Loading);
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(*rx.borrow_and_update(), SessionState::Loading);

        cache.set_state(SessionState::Unauthenticated);
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(*rx.borrow_and_update(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn sign_out_without_token_is_local_only() -> Result<(), ClientError> {
        // No token held, so no network call happens; the state still settles.
        let cache = cache();
        cache.sign_out().await?;
        assert_eq!(cache.state(), SessionState::Unauthenticated);
        assert_eq!(cache.token().await, None);
        Ok(())
    }
}
