//! Password and reset-token hashing.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use rand_core::{OsRng, RngCore};

use crate::error::ApiError;

/// A fresh random token, hex-encoded (32 bytes of entropy).
pub fn generate_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// argon2 PHC string for `secret`.
pub fn hash_secret(secret: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(secret.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

/// Whether `secret` matches the PHC string `hash`. Malformed hashes never
/// match.
pub fn verify_secret(secret: &str, hash: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(hash) else {
    return false;
  };
  Argon2::default().verify_password(secret.as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokens_are_random_hex() {
    let a = generate_token();
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(a, generate_token());
  }

  #[test]
  fn hashes_verify_only_their_secret() {
    let hash = hash_secret("open sesame").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_secret("open sesame", &hash));
    assert!(!verify_secret("open barley", &hash));
    assert!(!verify_secret("open sesame", "not a phc string"));
  }
}
