//! Password hashing and verification.
//!
//! bcrypt is CPU-bound; the async helpers move it onto tokio's blocking pool so a login storm
//! cannot stall the request executor.

use crate::config::PasswordConfig;
use crate::errors::{Error, Result};

/// Hash a password with bcrypt at the given cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).map_err(|e| Error::Internal {
        operation: format!("hash password: {e}"),
    })
}

/// Verify a password against a bcrypt hash.
///
/// A stored value that is not a bcrypt hash is reported as an internal error rather than a
/// mismatch, so a corrupted row is visible in logs.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).map_err(|e| Error::Internal {
        operation: format!("verify password: {e}"),
    })
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: String, cost: u32) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?
}

/// Check a new password against the configured length rules.
pub fn validate_password(password: &str, rules: &PasswordConfig) -> Result<()> {
    let length = password.chars().count();
    if length < rules.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters long", rules.min_length),
        });
    }
    if length > rules.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at most {} characters long", rules.max_length),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum bcrypt cost keeps the tests fast
    const TEST_COST: u32 = 4;

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("test_password_123", TEST_COST).unwrap();

        assert!(hash.starts_with("$2"));
        assert!(verify_password("test_password_123", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let hash1 = hash_password("same_password", TEST_COST).unwrap();
        let hash2 = hash_password("same_password", TEST_COST).unwrap();

        // Salted
        assert_ne!(hash1, hash2);
        assert!(verify_password("same_password", &hash1).unwrap());
        assert!(verify_password("same_password", &hash2).unwrap());
    }

    #[test]
    fn test_verify_against_garbage_hash_is_error() {
        assert!(verify_password("anything", "not-a-bcrypt-hash").is_err());
    }

    #[tokio::test]
    async fn test_blocking_helpers() {
        let hash = hash_password_blocking("pa55word!".to_string(), TEST_COST).await.unwrap();
        assert!(verify_password_blocking("pa55word!".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password_blocking("nope".to_string(), hash).await.unwrap());
    }

    #[test]
    fn test_validate_password_length() {
        let rules = PasswordConfig {
            min_length: 8,
            max_length: 12,
        };
        assert!(validate_password("short", &rules).is_err());
        assert!(validate_password("just-right", &rules).is_ok());
        assert!(validate_password("much-too-long-password", &rules).is_err());
    }
}
