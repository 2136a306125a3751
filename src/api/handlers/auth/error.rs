//! Error taxonomy for the authentication boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures surfaced by the auth endpoints.
///
/// Messages are static so no credential or token value can leak into a
/// response. Unknown-email and wrong-password both map to
/// `InvalidCredential`, which keeps accounts non-enumerable from the outside;
/// the precise cause stays in internal logs only.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("an account with this email already exists")]
    DuplicateEmail,

    #[error("password must be at least 8 characters long")]
    WeakCredential,

    #[error("invalid email or password")]
    InvalidCredential,

    #[error("session not found")]
    SessionNotFound,

    #[error("session expired")]
    SessionExpired,

    #[error("storage unavailable")]
    StorageUnavailable(anyhow::Error),
}

impl From<super::storage::StoreError> for AuthError {
    fn from(err: super::storage::StoreError) -> Self {
        match err {
            super::storage::StoreError::DuplicateEmail => Self::DuplicateEmail,
            // Token collisions are retried at the issuer; one escaping this
            // far means the store is misbehaving.
            super::storage::StoreError::DuplicateToken => {
                Self::StorageUnavailable(anyhow::anyhow!("session token collision"))
            }
            super::storage::StoreError::Unavailable(source) => Self::StorageUnavailable(source),
        }
    }
}

impl AuthError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateEmail => StatusCode::CONFLICT,
            Self::WeakCredential => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidCredential | Self::SessionNotFound | Self::SessionExpired => {
                StatusCode::UNAUTHORIZED
            }
            // The only retryable kind; everything else is terminal for the request.
            Self::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::StorageUnavailable(err) = &self {
            error!("Storage unavailable: {err:#}");
        }
        error_body(self.status(), &self.to_string())
    }
}

/// Build the `{"error": {"message": ...}}` body every failure uses.
pub(crate) fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": {"message": message}}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn status_mapping() {
        assert_eq!(AuthError::DuplicateEmail.status(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::WeakCredential.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AuthError::InvalidCredential.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::SessionNotFound.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::SessionExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::StorageUnavailable(anyhow!("down")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn messages_are_generic() {
        // One message for both credential failure causes.
        assert_eq!(
            AuthError::InvalidCredential.to_string(),
            "invalid email or password"
        );
        // The source error never reaches the display string.
        let err = AuthError::StorageUnavailable(anyhow!("connection refused to 10.0.0.1"));
        assert_eq!(err.to_string(), "storage unavailable");
    }

    #[test]
    fn response_carries_error_envelope() {
        let response = AuthError::DuplicateEmail.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
