//! Password hashing and secret comparison.
//!
//! bcrypt runs on the blocking pool so a slow hash never stalls the runtime.

use tokio::sync::OnceCell;
use crate::errors::{AppError, AppResult};

// Hash of a throwaway password, checked when there is no stored hash so a
// missing user costs the same bcrypt round as a wrong password.
static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

/// Outcome of checking a password against a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Invalid,
    Valid,
    /// Matched a legacy plaintext record that should be rehashed.
    ValidLegacy,
}

pub fn is_bcrypt_hash(stored: &str) -> bool {
    stored.len() == 60
        && ["$2a$", "$2b$", "$2x$", "$2y$"]
            .iter()
            .any(|prefix| stored.starts_with(prefix))
}

pub async fn hash(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hash task failed: {}", e)))?
        .map_err(AppError::from)
}

/// An empty `stored` value never matches.
pub async fn verify(password: &str, stored: &str) -> AppResult<Verification> {
    if stored.is_empty() {
        return Ok(Verification::Invalid);
    }
    if !is_bcrypt_hash(stored) {
        return Ok(if constant_time_eq(password.as_bytes(), stored.as_bytes()) {
            Verification::ValidLegacy
        } else {
            Verification::Invalid
        });
    }

    let password = password.to_owned();
    let stored = stored.to_owned();
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &stored))
        .await
        .map_err(|e| AppError::Internal(format!("verify task failed: {}", e)))??;

    Ok(if valid { Verification::Valid } else { Verification::Invalid })
}

/// Burns one bcrypt verification for a login that cannot succeed.
/// Always `Invalid`. The dummy hash is made once, at the first caller's cost.
pub async fn verify_dummy(password: &str, cost: u32) -> AppResult<Verification> {
    let dummy = DUMMY_HASH
        .get_or_try_init(|| hash("not-a-real-password", cost))
        .await?;
    verify(password, dummy).await?;
    Ok(Verification::Invalid)
}

/// Compares two secrets without short-circuiting on the first differing byte.
/// Only the length leaks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
