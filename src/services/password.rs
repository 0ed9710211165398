//! Password hashing and reset tokens
//!
//! Passwords are stored as Argon2id PHC strings. Reset tokens are random
//! and only their SHA-256 digest is persisted.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password using Argon2id with a fresh random salt.
///
/// # Arguments
///
/// * `password` - The plaintext password to hash
///
/// # Returns
///
/// The PHC string (algorithm, parameters, salt and hash), e.g.
/// `$argon2id$v=19$...`
///
/// # Errors
///
/// Returns an error if hashing fails
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored PHC hash.
///
/// # Arguments
///
/// * `password` - The plaintext password from the login form
/// * `hash` - The stored PHC string
///
/// # Returns
///
/// `true` if the password matches, `false` otherwise
///
/// # Errors
///
/// Returns an error only when `hash` is not a valid PHC string
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e)),
    }
}

/// New password and its confirmation must match and be long enough
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LENGTH
        ));
    }
    if password != confirmation {
        return Err("Passwords do not match.".to_string());
    }
    Ok(())
}

/// Random single-use reset token (64 hex chars)
pub fn generate_reset_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Digest of a reset token, as stored in `password_resets`.
///
/// # Arguments
///
/// * `token` - The plaintext token from the reset link
///
/// # Returns
///
/// 64 lowercase hex characters of the token's SHA-256
pub fn hash_reset_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_invalid_hash() {
        assert!(verify_password("password", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_validate_new_password() {
        assert!(validate_new_password("longenough", "longenough").is_ok());
        assert_eq!(
            validate_new_password("short", "short").unwrap_err(),
            "Password must be at least 8 characters."
        );
        assert_eq!(
            validate_new_password("longenough", "different!").unwrap_err(),
            "Passwords do not match."
        );
    }

    #[test]
    fn test_reset_token_hashing() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, generate_reset_token());

        let hash = hash_reset_token(&token);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_reset_token(&token));
        assert_eq!(
            hash_reset_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
