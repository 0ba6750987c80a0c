use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::AuthError;
use crate::database::models::user::MIN_PASSWORD_LENGTH;
use crate::database::StoreError;

pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Malformed stored hashes never match.
pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Checks a new password and its confirmation before hashing.
pub fn validate_new_password(password: Option<&str>, confirm: Option<&str>) -> Result<(), StoreError> {
    let mut errors = Vec::new();
    match password {
        None | Some("") => errors.push("Please provide a password".to_string()),
        Some(p) if p.chars().count() < MIN_PASSWORD_LENGTH => {
            errors.push(format!("A password must have at least {} characters", MIN_PASSWORD_LENGTH))
        }
        Some(_) => {}
    }
    match confirm {
        None | Some("") => errors.push("Please confirm your password".to_string()),
        Some(c) if Some(c) != password => errors.push("Passwords are not the same!".to_string()),
        Some(_) => {}
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation { errors })
    }
}

/// A fresh single-use reset token: (raw hex token to email, sha256 hex digest to store).
pub fn generate_reset_token() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    let hashed = hash_reset_token(&raw);
    (raw, hashed)
}

pub fn hash_reset_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify() {
        let hash = hash_password("pass1234").unwrap();
        assert_ne!(hash, "pass1234");
        assert!(verify_password("pass1234", &hash));
        assert!(!verify_password("wrong-pass", &hash));
        assert!(!verify_password("pass1234", "not-a-hash"));
    }

    #[test]
    fn new_password_rules() {
        assert!(validate_new_password(Some("pass1234"), Some("pass1234")).is_ok());

        let err = validate_new_password(Some("pass1234"), Some("pass4321")).unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: Passwords are not the same!");

        let err = validate_new_password(Some("short"), None).unwrap_err();
        assert!(matches!(err, StoreError::Validation { errors } if errors.len() == 2));
    }

    #[test]
    fn reset_tokens_are_hex_and_hashed() {
        let (raw, hashed) = generate_reset_token();
        assert_eq!(raw.len(), 64);
        assert!(raw.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hashed, hash_reset_token(&raw));
        assert_ne!(raw, hashed);
        assert_eq!(
            hash_reset_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
