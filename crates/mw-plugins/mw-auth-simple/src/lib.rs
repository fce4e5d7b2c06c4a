//! # mw-auth-simple
//!
//! Argon2-based implementation of `AuthProvider`: one admin account whose
//! password hash comes from configuration.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use mw_core::traits::AuthProvider;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

pub struct SimpleAuthProvider {
    username: String,
    /// PHC-format Argon2 hash (`$argon2id$v=19$...`)
    password_hash: SecretString,
}

impl SimpleAuthProvider {
    pub fn new(username: impl Into<String>, password_hash: SecretString) -> Self {
        Self {
            username: username.into(),
            password_hash,
        }
    }

    /// Whether a usable hash was configured. Without one every login fails.
    pub fn is_configured(&self) -> bool {
        PasswordHash::new(self.password_hash.expose_secret()).is_ok()
    }
}

/// Produces a PHC string suitable for `admin.password_hash`.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let mut salt = [0u8; 16];
    rand::rng().fill(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| anyhow::anyhow!("salt encoding failed: {e}"))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

#[async_trait]
impl AuthProvider for SimpleAuthProvider {
    /// Verifies the provided credentials against the configured Argon2 hash.
    async fn check_credentials(&self, username: &str, password: &str) -> bool {
        let parsed_hash = match PasswordHash::new(self.password_hash.expose_secret()) {
            Ok(p) => p,
            Err(_) => {
                warn!("admin password hash is missing or malformed; rejecting login");
                return false;
            }
        };
        let password_ok = Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok();
        password_ok && username == self.username
    }
}
