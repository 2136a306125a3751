//! Auth state and configuration.

use secrecy::SecretString;
use std::sync::Arc;

use super::rate_limit::RateLimiter;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    token_secret: SecretString,
    session_ttl_seconds: i64,
    session_sliding: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String, token_secret: SecretString) -> Self {
        Self {
            base_url,
            token_secret,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_sliding: false,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_sliding(mut self, sliding: bool) -> Self {
        self.session_sliding = sliding;
        self
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn token_secret(&self) -> &SecretString {
        &self.token_secret
    }

    pub(super) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(super) fn session_sliding(&self) -> bool {
        self.session_sliding
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    pub fn new(config: AuthConfig, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            config,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::{AuthConfig, AuthState};
    use secrecy::SecretString;
    use std::sync::Arc;

    fn config(base_url: &str) -> AuthConfig {
        AuthConfig::new(base_url.to_string(), SecretString::from("pepper"))
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = config("https://auth.example.com");

        assert_eq!(config.base_url(), "https://auth.example.com");
        assert_eq!(
            config.session_ttl_seconds(),
            super::DEFAULT_SESSION_TTL_SECONDS
        );
        assert!(!config.session_sliding());

        let config = config
            .with_session_ttl_seconds(120)
            .with_session_sliding(true);

        assert_eq!(config.session_ttl_seconds(), 120);
        assert!(config.session_sliding());
    }

    #[test]
    fn cookie_secure_follows_base_url_scheme() {
        assert!(config("https://auth.example.com").session_cookie_secure());
        assert!(!config("http://localhost:8080").session_cookie_secure());
    }

    #[test]
    fn auth_state_constructs_with_noop_rate_limiter() {
        let state = AuthState::new(config("http://localhost:8080"), Arc::new(NoopRateLimiter));
        assert_eq!(state.config().base_url(), "http://localhost:8080");
    }
}
