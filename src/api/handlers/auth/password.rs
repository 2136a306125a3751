//! Credential hashing, delegated to `argon2`.

use anyhow::{anyhow, Context, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use rand::{rngs::OsRng, RngCore};

/// Hash a password into a PHC string for storage.
/// The plaintext only exists for the duration of this call.
pub(crate) fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .context("failed to generate password salt")?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Verify a password against a stored PHC string.
pub(crate) fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Burn the same work as a real verification when no account matches,
/// keeping unknown-email and wrong-password responses indistinguishable.
pub(crate) fn dummy_verify(password: &str) {
    let _ = hash_password(password);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() -> Result<()> {
        let hash = hash_password("password1")?;
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "password1"));
        assert!(!verify_password(&hash, "password2"));
        Ok(())
    }

    #[test]
    fn hashes_are_salted() -> Result<()> {
        let first = hash_password("password1")?;
        let second = hash_password("password1")?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("not-a-phc-string", "password1"));
        assert!(!verify_password("", "password1"));
    }
}
