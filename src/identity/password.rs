//! Argon2 secret hashing. PHC-format strings are stored; verification parses
//! whatever is on disk, so hash parameters can change without migration.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;
use password_hash::{PasswordHash, SaltString};

use crate::error::{AppError, AppResult};

static ARGON2: Lazy<Argon2<'static>> = Lazy::new(Argon2::default);

pub fn hash_password(password: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| AppError::store("hash_error", e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::store("hash_error", e.to_string()))?;
    let phc = ARGON2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::store("hash_error", e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        ARGON2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

/// Hash on the blocking pool so one slow hash does not stall unrelated
/// requests on the async runtime.
pub async fn hash_password_blocking(password: &str) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::store("hash_error", e.to_string()))?
}

/// Verify on the blocking pool; see `hash_password_blocking`.
pub async fn verify_password_blocking(hash: &str, password: &str) -> bool {
    let hash = hash.to_string();
    let password = password.to_string();
    tokio::task::spawn_blocking(move || verify_password(&hash, &password))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let phc = hash_password("s3cr3t!").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password(&phc, "s3cr3t!"));
        assert!(!verify_password(&phc, "wrong"));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }
}
