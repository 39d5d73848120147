//! Password and PIN hashing with Argon2

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash a USB key PIN for storage.
///
/// PINs go through the same Argon2id path as passwords; whitespace is
/// stripped so a copy-pasted PIN matches what the user typed on the device.
pub fn hash_pin(pin: &str) -> Result<String, PasswordError> {
    hash_password(pin.trim())
}

/// Verify a USB key PIN against its stored hash
pub fn verify_pin(pin: &str, hash: &str) -> Result<bool, PasswordError> {
    verify_password(pin.trim(), hash)
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Invalid password hash: {0}")]
    InvalidHash(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "admin123";
        let hash = hash_password(password).expect("Failed to hash password");

        assert!(verify_password(password, &hash).expect("Verification failed"));
        assert!(!verify_password("wrong_password", &hash).expect("Verification failed"));
    }

    #[test]
    fn test_pin_round_trip() {
        let hash = hash_pin("123").expect("Failed to hash PIN");

        assert!(verify_pin("123", &hash).expect("Verification failed"));
        assert!(verify_pin(" 123 ", &hash).expect("Verification failed"));
        assert!(!verify_pin("000", &hash).expect("Verification failed"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("admin123").expect("Failed to hash password");
        let second = hash_password("admin123").expect("Failed to hash password");
        assert_ne!(first, second);
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(verify_password("admin123", "not-a-phc-string").is_err());
    }
}
