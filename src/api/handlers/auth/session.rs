//! Session issuance, validation, and the endpoints for cookie/bearer auth.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, warn};

use super::{
    error::AuthError,
    state::{AuthConfig, AuthState},
    storage::{IdentityStore, UserRecord},
    types::{SessionResponse, UserResponse},
    utils::{generate_session_token, hash_session_token, now_unix_seconds},
};

const SESSION_COOKIE_NAME: &str = "ensaluti_session";

/// Create a session for a user and return the raw token plus expiry.
///
/// The store only ever sees the peppered hash. Token-hash collisions are
/// retried a few times before giving up.
pub(super) async fn issue_session(
    store: &dyn IdentityStore,
    config: &AuthConfig,
    user_id: uuid::Uuid,
) -> Result<(String, i64), AuthError> {
    let ttl_seconds = config.session_ttl_seconds();

    for _ in 0..3 {
        let token =
            generate_session_token().map_err(AuthError::StorageUnavailable)?;
        let token_hash = hash_session_token(config.token_secret(), &token);
        match store.insert_session(user_id, &token_hash, ttl_seconds).await {
            Ok(record) => return Ok((token, record.expires_at_unix)),
            Err(super::storage::StoreError::DuplicateToken) => {}
            Err(err) => return Err(err.into()),
        }
    }

    Err(AuthError::StorageUnavailable(anyhow::anyhow!(
        "failed to generate unique session token"
    )))
}

/// Resolve a token to its owning user.
///
/// Absent sessions and expired sessions answer differently; expired rows are
/// removed on sight. Under the sliding policy the expiry is pushed forward
/// best-effort: a failed extension is logged, never surfaced.
pub(super) async fn validate_session(
    store: &dyn IdentityStore,
    state: &AuthState,
    token: &str,
) -> Result<UserRecord, AuthError> {
    let token_hash = hash_session_token(state.config().token_secret(), token);

    let Some(session) = store.lookup_session(&token_hash).await? else {
        return Err(AuthError::SessionNotFound);
    };

    if session.expires_at_unix <= now_unix_seconds() {
        if let Err(err) = store.delete_session(&token_hash).await {
            warn!("Failed to delete expired session: {err}");
        }
        return Err(AuthError::SessionExpired);
    }

    if state.config().session_sliding() {
        let ttl_seconds = state.config().session_ttl_seconds();
        if let Err(err) = store.extend_session(&token_hash, ttl_seconds).await {
            warn!("Failed to extend session: {err}");
        }
    }

    let Some(user) = store.lookup_user_by_id(session.user_id).await? else {
        // The owning user vanished; treat the session as gone.
        return Err(AuthError::SessionNotFound);
    };

    Ok(user)
}

#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No session token presented"),
        (status = 401, description = "Session not found or expired")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    store: Extension<Arc<dyn IdentityStore>>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    // Missing tokens are treated as "no session" to avoid leaking auth state.
    let Some(token) = extract_session_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };

    match validate_session(store.as_ref(), &auth_state, &token).await {
        Ok(user) => (
            StatusCode::OK,
            Json(SessionResponse {
                user: user_response(&user),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/sign-out",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn sign_out(
    headers: HeaderMap,
    store: Extension<Arc<dyn IdentityStore>>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_session_token(auth_state.config().token_secret(), &token);
        if let Err(err) = store.delete_session(&token_hash).await {
            error!("Failed to delete session: {err}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

pub(super) fn user_response(user: &UserRecord) -> UserResponse {
    UserResponse {
        id: user.id.to_string(),
        email: user.email.clone(),
        name: user.display_name.clone(),
    }
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    // Only mark cookies secure when the service is served over HTTPS.
    let secure = config.session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config() -> AuthConfig {
        AuthConfig::new(
            "https://auth.example.com".to_string(),
            SecretString::from("pepper"),
        )
    }

    #[test]
    fn session_cookie_carries_token_and_flags() -> Result<(), InvalidHeaderValue> {
        let cookie = session_cookie(&config(), "token-value")?;
        let cookie = cookie.to_str().unwrap_or_default().to_string();
        assert!(cookie.starts_with("ensaluti_session=token-value;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Secure"));
        Ok(())
    }

    #[test]
    fn plain_http_cookie_is_not_secure() -> Result<(), InvalidHeaderValue> {
        let config = AuthConfig::new(
            "http://localhost:8080".to_string(),
            SecretString::from("pepper"),
        );
        let cookie = session_cookie(&config, "token-value")?;
        let cookie = cookie.to_str().unwrap_or_default().to_string();
        assert!(!cookie.contains("Secure"));
        Ok(())
    }

    #[test]
    fn clear_cookie_zeroes_max_age() -> Result<(), InvalidHeaderValue> {
        let cookie = clear_session_cookie(&config())?;
        let cookie = cookie.to_str().unwrap_or_default().to_string();
        assert!(cookie.contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn extract_prefers_bearer_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("ensaluti_session=from-cookie"),
        );
        assert_eq!(
            extract_session_token(&headers),
            Some("from-header".to_string())
        );
    }

    #[test]
    fn extract_finds_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; ensaluti_session=abc123; lang=eo"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn extract_rejects_empty_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn extract_none_when_absent() {
        let headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);
    }
}
