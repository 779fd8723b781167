//! Trust-on-first-use passwords.
//!
//! The first password submitted for an email becomes that account's
//! password; every later credential login must match it.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::store::{FileStore, StoreError, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialCheck {
    /// No password was stored; this one is now the account's password.
    Enrolled,
    Matched,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("password does not match")]
    Mismatch,

    #[error("password hashing failed: {0}")]
    Hash(anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Upsert the user for `email`, then enroll `password` or check it against
/// the stored hash.
pub async fn check_or_enroll(
    store: &FileStore,
    email: &str,
    password: &str,
    now: OffsetDateTime,
) -> Result<(User, CredentialCheck), CredentialError> {
    let user = store.upsert_user_by_email(email, now).await?;

    let Some(stored) = user.password_hash.clone() else {
        let hash = blocking(password, hash_password).await?;
        let user = store
            .set_password_hash(&user.email, hash, now)
            .await?
            .unwrap_or(user);
        info!(user_id = %user.id, "password enrolled on first credential login");
        return Ok((user, CredentialCheck::Enrolled));
    };

    let matched = blocking(password, move |plain| verify_password(plain, &stored)).await?;
    if !matched {
        warn!(user_id = %user.id, "credential login with wrong password");
        return Err(CredentialError::Mismatch);
    }
    Ok((user, CredentialCheck::Matched))
}

/// Argon2 is CPU-bound; keep it off the async workers.
async fn blocking<T, F>(password: &str, f: F) -> Result<T, CredentialError>
where
    T: Send + 'static,
    F: FnOnce(&str) -> anyhow::Result<T> + Send + 'static,
{
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || f(&password))
        .await
        .map_err(|e| CredentialError::Hash(e.into()))?
        .map_err(CredentialError::Hash)
}

fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("argon2 hash: {e}"))
}

fn verify_password(plain: &str, encoded: &str) -> anyhow::Result<bool> {
    let parsed =
        PasswordHash::new(encoded).map_err(|e| anyhow::anyhow!("stored password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}
