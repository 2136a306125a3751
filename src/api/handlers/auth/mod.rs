//! Auth handlers and supporting modules.
//!
//! This module is the whole authentication boundary: credential submission
//! (sign-up/sign-in), session issuance and validation, and sign-out.
//!
//! ## Sessions
//!
//! Tokens are generated from `OsRng` and never stored raw; the database holds
//! a SHA-256 digest peppered with the server token secret. Validation tells
//! a missing session apart from an expired one, removes expired rows on
//! sight, and optionally extends the expiry (sliding policy).
//!
//! ## Account enumeration
//!
//! Sign-in returns one generic error for unknown email and wrong password,
//! and burns equivalent hashing work on both paths.

pub(crate) mod error;
pub(crate) mod login;
mod password;
mod rate_limit;
pub(crate) mod session;
pub(crate) mod signup;
mod state;
mod storage;
pub(crate) mod types;
mod utils;

pub use error::AuthError;
pub use rate_limit::{NoopRateLimiter, RateLimitAction, RateLimitDecision, RateLimiter};
pub use state::{AuthConfig, AuthState};
pub use storage::{
    CredentialRecord, IdentityStore, MemoryIdentityStore, NewUser, PgIdentityStore, SessionRecord,
    StoreError, UserRecord,
};
pub use types::{AuthSuccessResponse, SessionResponse, SignInRequest, SignUpRequest, UserResponse};
