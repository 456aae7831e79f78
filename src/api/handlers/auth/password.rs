//! bcrypt password hashing, run off the async executor.

use anyhow::{Context, Result};
use bcrypt::DEFAULT_COST;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Hash a plaintext password with bcrypt at the default cost.
///
/// # Errors
/// Returns an error if hashing fails or the blocking task panics.
pub async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, DEFAULT_COST))
        .await
        .context("password hashing task failed")?
        .context("failed to hash password")
}

/// Verify a plaintext password against a stored bcrypt hash.
///
/// Malformed hashes verify as `false`.
///
/// # Errors
/// Returns an error only if the blocking task panics.
pub async fn verify_password(password: String, hash: String) -> Result<bool> {
    if hash.is_empty() {
        return Ok(false);
    }
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("password verification task failed")?;
    Ok(verified.unwrap_or(false))
}

pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_and_verify() -> Result<()> {
        let hash = hash_password("hunter22".to_string()).await?;
        assert!(hash.starts_with("$2"));
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22".to_string(), hash.clone()).await?);
        assert!(!verify_password("hunter23".to_string(), hash).await?);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_hash_does_not_verify() -> Result<()> {
        assert!(!verify_password("secret".to_string(), "plaintext".to_string()).await?);
        assert!(!verify_password("secret".to_string(), String::new()).await?);
        Ok(())
    }

    #[test]
    fn password_length_rule() {
        assert!(valid_password("abcdef"));
        assert!(!valid_password("abcde"));
    }
}
