//! Sign-up endpoint.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::error;

use super::{
    error::{error_body, AuthError},
    password::hash_password,
    rate_limit::{RateLimitAction, RateLimitDecision},
    session::{issue_session, session_cookie, user_response},
    state::AuthState,
    storage::{IdentityStore, NewUser},
    types::{AuthSuccessResponse, SignUpRequest},
    utils::{extract_client_ip, normalize_email, valid_email, valid_password},
};

#[utoipa::path(
    post,
    path = "/auth/sign-up",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created and session issued", body = AuthSuccessResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Password below minimum length"),
        (status = 429, description = "Rate limited")
    ),
    tag = "auth"
)]
pub async fn sign_up(
    headers: HeaderMap,
    store: Extension<Arc<dyn IdentityStore>>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignUpRequest>>,
) -> impl IntoResponse {
    let request: SignUpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return error_body(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return error_body(StatusCode::BAD_REQUEST, "Invalid email");
    }

    if !valid_password(&request.password) {
        return AuthError::WeakCredential.into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::SignUp)
        == RateLimitDecision::Limited
    {
        return error_body(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }
    if auth_state
        .rate_limiter()
        .check_email(&email, RateLimitAction::SignUp)
        == RateLimitDecision::Limited
    {
        return error_body(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }

    // The plaintext stops here; only the PHC string is persisted.
    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Password hashing failed: {err}");
            return error_body(StatusCode::INTERNAL_SERVER_ERROR, "Sign-up failed");
        }
    };

    let display_name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    // The store's unique constraint is the arbiter for concurrent sign-ups
    // racing on one email.
    let user = match store
        .create_user(NewUser {
            email: &email,
            display_name,
            password_hash: &password_hash,
        })
        .await
    {
        Ok(user) => user,
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
        StatusCode::CREATED,
        response_headers,
        Json(AuthSuccessResponse {
            user: user_response(&user),
            token,
            expires_at,
        }),
    )
        .into_response()
}
