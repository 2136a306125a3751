//! Sign-in endpoint.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{debug, error};

use super::{
    error::{error_body, AuthError},
    password::{dummy_verify, verify_password},
    rate_limit::{RateLimitAction, RateLimitDecision},
    session::{issue_session, session_cookie, user_response},
    state::AuthState,
    storage::IdentityStore,
    types::{AuthSuccessResponse, SignInRequest},
    utils::{extract_client_ip, normalize_email, valid_email},
};

#[utoipa::path(
    post,
    path = "/auth/sign-in",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Credentials accepted and session issued", body = AuthSuccessResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid email or password"),
        (status = 429, description = "Rate limited")
    ),
    tag = "auth"
)]
pub async fn sign_in(
    headers: HeaderMap,
    store: Extension<Arc<dyn IdentityStore>>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignInRequest>>,
) -> impl IntoResponse {
    let request: SignInRequest = match payload {
        Some(Json(payload)) => payload,
        None => return error_body(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return error_body(StatusCode::BAD_REQUEST, "Invalid email");
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::SignIn)
        == RateLimitDecision::Limited
    {
        return error_body(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }
    if auth_state
        .rate_limiter()
        .check_email(&email, RateLimitAction::SignIn)
        == RateLimitDecision::Limited
    {
        return error_body(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }

    let credentials = match store.lookup_credentials(&email).await {
        Ok(credentials) => credentials,
        Err(err) => return AuthError::from(err).into_response(),
    };

    // Unknown email and wrong password must be indistinguishable from the
    // outside; the precise cause goes to debug logs only.
    let user_id = match credentials {
        Some(credentials) => {
            if verify_password(&credentials.password_hash, &request.password) {
                credentials.user_id
            } else {
                debug!("Sign-in rejected: password mismatch");
                return AuthError::InvalidCredential.into_response();
            }
        }
        None => {
            dummy_verify(&request.password);
            debug!("Sign-in rejected: unknown email");
            return AuthError::InvalidCredential.into_response();
        }
    };

    let user = match store.lookup_user_by_id(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            error!("Credentials resolved to a missing user");
            return AuthError::InvalidCredential.into_response();
        }
        Err(err) => return AuthError::from(err).into_response(),
    };

    let (token, expires_at) = match issue_session(store.as_ref(), auth_state.config(), user.id).await
    {
        Ok(issued) => issued,
        Err(err) => return err.into_response(),
    };

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = session_cookie(auth_state.config(), &token) {
        response_headers.insert(SET_COOKIE, cookie);
    }

    (
        StatusCode::OK,
        response_headers,
        Json(AuthSuccessResponse {
            user: user_response(&user),
            token,
            expires_at,
        }),
    )
        .into_response()
}
