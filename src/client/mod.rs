//! Typed HTTP client for the auth endpoints.
//!
//! [`AuthClient`] talks to a running service with bearer tokens (the header
//! carrier, for callers without cookie jars). [`SessionCache`] layers the
//! reactive session state machine on top.

pub mod cache;

pub use cache::{SessionCache, SessionState};

use crate::api::handlers::auth::{
    AuthSuccessResponse, SessionResponse, SignInRequest, SignUpRequest,
};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with a failure envelope.
    #[error("{message}")]
    Api { status: StatusCode, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub struct AuthClient {
    base_url: String,
    http: Client,
}

impl AuthClient {
    /// Build a client for a service base URL.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().user_agent(crate::APP_USER_AGENT).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// # Errors
    /// Returns `Api` for failure envelopes (e.g. duplicate email) and
    /// `Network`/`InvalidResponse` for transport problems.
    pub async fn sign_up(
        &self,
        request: &SignUpRequest,
    ) -> Result<AuthSuccessResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}/auth/sign-up", self.base_url))
            .json(request)
            .send()
            .await?;
        Self::parse_success(response).await
    }

    /// # Errors
    /// Returns `Api` with a generic message on credential mismatch; the
    /// service never distinguishes unknown email from wrong password.
    pub async fn sign_in(
        &self,
        request: &SignInRequest,
    ) -> Result<AuthSuccessResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}/auth/sign-in", self.base_url))
            .json(request)
            .send()
            .await?;
        Self::parse_success(response).await
    }

    /// # Errors
    /// Returns an error for transport problems; sign-out itself is idempotent.
    pub async fn sign_out(&self, token: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .post(format!("{}/auth/sign-out", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::api_error(response).await)
        }
    }

    /// Resolve the current session. `Ok(None)` means "no live session":
    /// no token presented, token unknown, or token expired.
    ///
    /// # Errors
    /// Returns `Api` only for server-side trouble (e.g. storage unavailable),
    /// never for a merely-invalid session.
    pub async fn session(&self, token: &str) -> Result<Option<SessionResponse>, ClientError> {
        let response = self
            .http
            .get(format!("{}/auth/session", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::UNAUTHORIZED => Ok(None),
            status if status.is_success() => {
                let session = response
                    .json::<SessionResponse>()
                    .await
                    .map_err(|err| ClientError::InvalidResponse(err.to_string()))?;
                Ok(Some(session))
            }
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn parse_success(response: Response) -> Result<AuthSuccessResponse, ClientError> {
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        response
            .json::<AuthSuccessResponse>()
            .await
            .map_err(|err| ClientError::InvalidResponse(err.to_string()))
    }

    /// Decode the `{"error": {"message": ...}}` envelope, falling back to the
    /// status reason when the body is not the expected shape.
    async fn api_error(response: Response) -> ClientError {
        let status = response.status();
        let message = match response.text().await {
            Ok(body) => serde_json::from_str::<Value>(&body)
                .ok()
                .as_ref()
                .and_then(|value| value.pointer("/error/message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                }),
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        ClientError::Api { status, message }
    }
}
