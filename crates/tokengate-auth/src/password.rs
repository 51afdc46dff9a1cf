//! Argon2id password hashing for stored credentials
//!
//! Stored credentials only ever hold PHC strings produced by [`hash_password`];
//! a login compares the supplied password with [`verify_password`].

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

/// Error types for password operations
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    /// The stored value is not a PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHashFormat(String),
}

/// Hash a password with Argon2id and a fresh random salt
///
/// Uses the `argon2` crate defaults (19 MiB memory, 2 iterations, 1 lane).
/// The returned PHC string embeds algorithm, parameters and salt, so it can be
/// stored as-is in a credential record.
///
/// # Example
/// ```
/// use tokengate_auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("123456").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// assert!(verify_password("123456", &hash).unwrap());
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Check a password against a stored PHC hash
///
/// Returns `Ok(false)` for a wrong password. An error is only returned when the
/// stored hash cannot be parsed or the verifier itself fails.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHashFormat(e.to_string()))?;

    // Parameters come from the PHC string, not from Argon2::default()
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id_phc_string() {
        let hash = hash_password("123456").expect("Failed to hash password");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m="));
        assert!(hash.contains("t="));
        assert!(hash.contains("p="));
    }

    #[test]
    fn test_hash_never_contains_plaintext() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("Failed to hash password");
        assert!(!hash.contains(password));
    }

    #[test]
    fn test_verify_matching_and_mismatching_password() {
        let hash = hash_password("123456789").expect("Failed to hash password");

        assert!(verify_password("123456789", &hash).unwrap());
        assert!(!verify_password("12345678", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        let result = verify_password("123456", "123456");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat(_))));
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let hash1 = hash_password("123").expect("Failed to hash password");
        let hash2 = hash_password("123").expect("Failed to hash password");

        assert_ne!(hash1, hash2);
        assert!(verify_password("123", &hash1).unwrap());
        assert!(verify_password("123", &hash2).unwrap());
    }

    #[test]
    fn test_verify_is_case_sensitive() {
        let hash = hash_password("Secret!").expect("Failed to hash password");

        assert!(verify_password("Secret!", &hash).unwrap());
        assert!(!verify_password("secret!", &hash).unwrap());
    }
}
