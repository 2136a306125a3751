//! Identity store: the only stateful component of the auth boundary.
//!
//! The contract is the [`IdentityStore`] trait; handlers never name a
//! database driver. [`PgIdentityStore`] is the production backend,
//! [`MemoryIdentityStore`] backs tests and local development.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use super::utils::{is_unique_violation, now_unix_seconds};

/// Failures a backend can signal without knowing about HTTP.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("session token collision")]
    DuplicateToken,

    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

/// A user as handlers and responses see it: no credential material.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

/// Sign-in material for one verification call; never leaves the login path.
pub struct CredentialRecord {
    pub user_id: Uuid,
    pub password_hash: String,
}

/// A stored session. Expiry is exposed so the validator can distinguish
/// a missing session from an expired one.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub expires_at_unix: i64,
}

/// Fields needed to create a user.
pub struct NewUser<'a> {
    pub email: &'a str,
    pub display_name: Option<&'a str>,
    pub password_hash: &'a str,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Create a user; the backend's unique constraint serializes concurrent
    /// sign-ups for the same email (`DuplicateEmail` for the loser).
    async fn create_user(&self, new_user: NewUser<'_>) -> Result<UserRecord, StoreError>;

    /// Look up sign-in material by normalized email.
    async fn lookup_credentials(&self, email: &str)
        -> Result<Option<CredentialRecord>, StoreError>;

    async fn lookup_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    /// Store a session under its token hash; `DuplicateToken` on collision.
    async fn insert_session(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<SessionRecord, StoreError>;

    /// Look up a session without filtering on expiry; expired rows are
    /// reported so the validator can remove them and answer precisely.
    async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>, StoreError>;

    /// Push the expiry forward (sliding policy). Best-effort from the
    /// caller's perspective; a lost race only shortens the window.
    async fn extend_session(&self, token_hash: &[u8], ttl_seconds: i64)
        -> Result<(), StoreError>;

    async fn delete_session(&self, token_hash: &[u8]) -> Result<(), StoreError>;

    /// Connectivity probe for `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}

fn unavailable(context: &'static str, err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(anyhow::Error::new(err).context(context))
}

/// Postgres-backed identity store.
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn create_user(&self, new_user: NewUser<'_>) -> Result<UserRecord, StoreError> {
        let query = r"
            INSERT INTO users (email, display_name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(new_user.email)
            .bind(new_user.display_name)
            .bind(new_user.password_hash)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(UserRecord {
                id: row.get("id"),
                email: new_user.email.to_string(),
                display_name: new_user.display_name.map(str::to_string),
            }),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateEmail),
            Err(err) => Err(unavailable("failed to insert user", err)),
        }
    }

    async fn lookup_credentials(
        &self,
        email: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let query = "SELECT id, password_hash FROM users WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable("failed to lookup credentials", err))?;

        Ok(row.map(|row| CredentialRecord {
            user_id: row.get("id"),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn lookup_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let query = "SELECT id, email, display_name FROM users WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable("failed to lookup user", err))?;

        Ok(row.map(|row| UserRecord {
            id: row.get("id"),
            email: row.get("email"),
            display_name: row.get("display_name"),
        }))
    }

    async fn insert_session(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<SessionRecord, StoreError> {
        let query = r"
            INSERT INTO user_sessions (user_id, token_hash, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
            RETURNING EXTRACT(EPOCH FROM expires_at)::BIGINT AS expires_at_unix
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(ttl_seconds)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(SessionRecord {
                user_id,
                expires_at_unix: row.get("expires_at_unix"),
            }),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateToken),
            Err(err) => Err(unavailable("failed to insert session", err)),
        }
    }

    async fn lookup_session(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<SessionRecord>, StoreError> {
        let query = r"
            SELECT user_id, EXTRACT(EPOCH FROM expires_at)::BIGINT AS expires_at_unix
            FROM user_sessions
            WHERE token_hash = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable("failed to lookup session", err))?;

        Ok(row.map(|row| SessionRecord {
            user_id: row.get("user_id"),
            expires_at_unix: row.get("expires_at_unix"),
        }))
    }

    async fn extend_session(
        &self,
        token_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<(), StoreError> {
        let query = r"
            UPDATE user_sessions
            SET expires_at = NOW() + ($2 * INTERVAL '1 second'),
                last_seen_at = NOW()
            WHERE token_hash = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable("failed to extend session", err))?;
        Ok(())
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<(), StoreError> {
        // Sign-out is idempotent; it's fine if no rows are deleted.
        let query = "DELETE FROM user_sessions WHERE token_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable("failed to delete session", err))?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let span = tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable("failed to ping database", err))?;
        Ok(())
    }
}

struct StoredUser {
    id: Uuid,
    email: String,
    display_name: Option<String>,
    password_hash: String,
}

struct MemoryInner {
    users: HashMap<Uuid, StoredUser>,
    users_by_email: HashMap<String, Uuid>,
    sessions: HashMap<Vec<u8>, SessionRecord>,
}

/// In-memory identity store for tests and local development.
pub struct MemoryIdentityStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                users: HashMap::new(),
                users_by_email: HashMap::new(),
                sessions: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn create_user(&self, new_user: NewUser<'_>) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.users_by_email.contains_key(new_user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        let id = Uuid::new_v4();
        inner.users_by_email.insert(new_user.email.to_string(), id);
        inner.users.insert(
            id,
            StoredUser {
                id,
                email: new_user.email.to_string(),
                display_name: new_user.display_name.map(str::to_string),
                password_hash: new_user.password_hash.to_string(),
            },
        );

        Ok(UserRecord {
            id,
            email: new_user.email.to_string(),
            display_name: new_user.display_name.map(str::to_string),
        })
    }

    async fn lookup_credentials(
        &self,
        email: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let inner = self.inner.lock().await;
        let record = inner
            .users_by_email
            .get(email)
            .and_then(|id| inner.users.get(id))
            .map(|user| CredentialRecord {
                user_id: user.id,
                password_hash: user.password_hash.clone(),
            });
        Ok(record)
    }

    async fn lookup_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(&user_id).map(|user| UserRecord {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
        }))
    }

    async fn insert_session(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<SessionRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.sessions.contains_key(token_hash) {
            return Err(StoreError::DuplicateToken);
        }
        let record = SessionRecord {
            user_id,
            expires_at_unix: now_unix_seconds() + ttl_seconds,
        };
        inner.sessions.insert(token_hash.to_vec(), record.clone());
        Ok(record)
    }

    async fn lookup_session(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<SessionRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.sessions.get(token_hash).cloned())
    }

    async fn extend_session(
        &self,
        token_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.sessions.get_mut(token_hash) {
            session.expires_at_unix = now_unix_seconds() + ttl_seconds;
        }
        Ok(())
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.sessions.remove(token_hash);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> NewUser<'static> {
        NewUser {
            email: "alice@example.com",
            display_name: Some("Alice"),
            password_hash: "$argon2id$stub",
        }
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_email() -> Result<(), StoreError> {
        let store = MemoryIdentityStore::new();
        store.create_user(alice()).await?;

        let duplicate = store
            .create_user(NewUser {
                email: "alice@example.com",
                display_name: None,
                password_hash: "$argon2id$other",
            })
            .await;
        assert!(matches!(duplicate, Err(StoreError::DuplicateEmail)));
        Ok(())
    }

    #[tokio::test]
    async fn credentials_resolve_to_owner() -> Result<(), StoreError> {
        let store = MemoryIdentityStore::new();
        let user = store.create_user(alice()).await?;

        let creds = store.lookup_credentials("alice@example.com").await?;
        let creds = creds.expect("credentials should exist");
        assert_eq!(creds.user_id, user.id);
        assert_eq!(creds.password_hash, "$argon2id$stub");

        let missing = store.lookup_credentials("bob@example.com").await?;
        assert!(missing.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn user_record_carries_no_credential_material() -> Result<(), StoreError> {
        let store = MemoryIdentityStore::new();
        let user = store.create_user(alice()).await?;
        let fetched = store.lookup_user_by_id(user.id).await?;
        let fetched = fetched.expect("user should exist");
        // Only identity fields come back; the hash stays behind the trait.
        assert_eq!(fetched.email, "alice@example.com");
        assert_eq!(fetched.display_name.as_deref(), Some("Alice"));
        Ok(())
    }

    #[tokio::test]
    async fn session_lifecycle() -> Result<(), StoreError> {
        let store = MemoryIdentityStore::new();
        let user = store.create_user(alice()).await?;

        let record = store.insert_session(user.id, b"hash-1", 3600).await?;
        assert_eq!(record.user_id, user.id);
        assert!(record.expires_at_unix > now_unix_seconds());

        let found = store.lookup_session(b"hash-1").await?;
        assert!(found.is_some());

        let collision = store.insert_session(user.id, b"hash-1", 3600).await;
        assert!(matches!(collision, Err(StoreError::DuplicateToken)));

        store.delete_session(b"hash-1").await?;
        let gone = store.lookup_session(b"hash-1").await?;
        assert!(gone.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn expired_sessions_are_still_reported() -> Result<(), StoreError> {
        let store = MemoryIdentityStore::new();
        let user = store.create_user(alice()).await?;

        store.insert_session(user.id, b"hash-2", -10).await?;
        let found = store.lookup_session(b"hash-2").await?;
        let found = found.expect("expired session should still be visible to the validator");
        assert!(found.expires_at_unix <= now_unix_seconds());
        Ok(())
    }

    #[tokio::test]
    async fn extend_session_moves_expiry_forward() -> Result<(), StoreError> {
        let store = MemoryIdentityStore::new();
        let user = store.create_user(alice()).await?;

        store.insert_session(user.id, b"hash-3", 10).await?;
        store.extend_session(b"hash-3", 3600).await?;

        let found = store.lookup_session(b"hash-3").await?;
        let found = found.expect("session should exist");
        assert!(found.expires_at_unix >= now_unix_seconds() + 3000);
        Ok(())
    }

    #[tokio::test]
    async fn extend_missing_session_is_a_noop() -> Result<(), StoreError> {
        let store = MemoryIdentityStore::new();
        store.extend_session(b"missing", 3600).await?;
        Ok(())
    }
}
