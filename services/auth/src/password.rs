//! Password hashing

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use rand::rngs::OsRng;

use crate::error::{AuthError, AuthResult};

/// Argon2id PHC string for `password` with a fresh salt
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))
}
