//! Password hashing
//!
//! Account passwords are stored as Argon2id PHC strings. Parameters come from
//! `config`; verification reads them back from the stored hash, so older
//! hashes keep verifying after a parameter change.

use crate::config::{PASSWORD_HASH_ITERATIONS, PASSWORD_HASH_MEMORY_KIB, PASSWORD_HASH_PARALLELISM};
use crate::error::{AppError, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

fn hasher() -> Result<Argon2<'static>> {
    let params = Params::new(
        PASSWORD_HASH_MEMORY_KIB,
        PASSWORD_HASH_ITERATIONS,
        PASSWORD_HASH_PARALLELISM,
        None,
    )
    .map_err(|e| AppError::PasswordHash(format!("Invalid Argon2 parameters: {}", e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a plaintext password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::PasswordHash(e.to_string()))?;

    Ok(hash.to_string())
}

/// Whether `stored` parses as a PHC hash string
pub fn is_password_hash(stored: &str) -> bool {
    PasswordHash::new(stored).is_ok()
}

/// Check a plaintext password against a stored PHC string.
///
/// A stored value that is not a valid hash never matches.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Stored password is not a valid hash: {}", e);
            return false;
        }
    };

    match hasher() {
        Ok(argon2) => argon2.verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            tracing::error!("{}", e);
            false
        }
    }
}
