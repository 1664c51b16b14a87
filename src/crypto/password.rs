use argon2::password_hash::{ rand_core::OsRng, SaltString };
use argon2::{ Argon2, PasswordHash, PasswordHasher, PasswordVerifier };

use crate::error::{ AppError, Result };

/// Hash a user password into a PHC string (Argon2id, random salt).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a digest from [`hash_password`]. A malformed
/// digest never verifies.
pub fn verify_password(password: &str, digest: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(digest) else {
        tracing::warn!("Refusing to verify against malformed password digest");
        return false;
    };

    Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok()
}
