//! # Ensaluti (Session Authentication Service)
//!
//! `ensaluti` is a standalone session-authentication boundary: it accepts
//! credential submissions, persists identities in a relational store, issues
//! opaque session tokens, and resolves those tokens back to users.
//!
//! ## Sessions
//!
//! Session tokens are 32 random bytes, URL-safe base64 encoded. The database
//! only stores a peppered SHA-256 digest of the token, so a leaked database
//! cannot be replayed against the API. Tokens travel in an `HttpOnly` cookie
//! or an `Authorization: Bearer` header.
//!
//! ## Identity Store
//!
//! All persistence goes through the [`api::handlers::auth::IdentityStore`]
//! trait. The production backend is Postgres via `sqlx`; an in-memory backend
//! ships for tests and local development. The auth contract never names a
//! database driver.
//!
//! ## Client
//!
//! The [`client`] module provides a typed HTTP client for the auth endpoints
//! and a reactive [`client::SessionCache`] that UI code can subscribe to.
//! Credential failures are deliberately indistinguishable between unknown
//! email and wrong password to prevent account enumeration.

pub mod api;
pub mod cli;
pub mod client;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
