//! Email/password verification against stored user records

use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::auth::user::UserIdentity;
use crate::config::RepositoryPolicy;
use crate::error::{GalleryError, Result};
use crate::security::constant_time_eq;
use crate::storage::{guard, SharedStorage, StoredUser};

/// Hash a password into an Argon2 PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| GalleryError::ConfigError(format!("Failed to encode salt: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| GalleryError::ConfigError(format!("Failed to hash password: {}", e)))
}

/// Compare a submitted password with the stored credential.
///
/// Stored values starting with `$argon2` are PHC hashes; anything else is a
/// plaintext seed value and is compared in constant time.
pub fn password_matches(stored: &str, submitted: &str) -> bool {
    if stored.starts_with("$argon2") {
        match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(submitted.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                log::error!("Stored password hash is malformed: {}", e);
                false
            }
        }
    } else {
        constant_time_eq(stored, submitted)
    }
}

/// Checks submitted credentials. Performs a single lookup and no writes.
pub struct CredentialVerifier {
    storage: SharedStorage,
    policy: RepositoryPolicy,
}

impl CredentialVerifier {
    pub fn new(storage: SharedStorage, policy: RepositoryPolicy) -> Self {
        Self { storage, policy }
    }

    /// Unknown email and wrong password fail with the same error
    pub async fn verify(&self, email: &str, password: &str) -> Result<UserIdentity> {
        let users = self.storage.user_storage();
        let user = guard::read(self.policy, "find_user_by_email", move || {
            users.find_user_by_email(email)
        })
        .await?;

        match user {
            Some(user) if password_matches(&user.password, password) => Ok(identity_of(&user)),
            _ => Err(GalleryError::InvalidCredentials),
        }
    }
}

pub fn identity_of(user: &StoredUser) -> UserIdentity {
    UserIdentity {
        id: user.id,
        email: user.email.clone(),
        role: user.role,
    }
}
