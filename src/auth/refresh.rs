//! Refresh token issue, redemption and revocation
//!
//! One active refresh token per user. Issuing overwrites the previous value
//! in a single upsert; redemption does not rotate.

use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;

use crate::auth::credentials::identity_of;
use crate::auth::token::{AccessToken, TokenCodec};
use crate::auth::user::UserId;
use crate::config::{AuthSettings, RepositoryPolicy};
use crate::constants::{MAX_TOKEN_LENGTH, REFRESH_TOKEN_BYTES};
use crate::error::{GalleryError, Result};
use crate::security::constant_time_eq;
use crate::security_logger::{log_security_event, token_fingerprint, SecurityEvent};
use crate::storage::{guard, RefreshGrant, SharedStorage};

/// 32 random bytes from the OS, hex-encoded
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub struct RefreshStore {
    storage: SharedStorage,
    policy: RepositoryPolicy,
    codec: Arc<TokenCodec>,
    ttl: chrono::Duration,
}

impl RefreshStore {
    pub fn new(
        storage: SharedStorage,
        policy: RepositoryPolicy,
        codec: Arc<TokenCodec>,
        settings: &AuthSettings,
    ) -> Self {
        Self {
            storage,
            policy,
            codec,
            ttl: settings.refresh_token_ttl,
        }
    }

    /// Generate and persist a new refresh token for the user, replacing any previous one
    pub async fn issue(&self, user_id: UserId) -> Result<String> {
        let grant = RefreshGrant {
            token: generate_refresh_token(),
            expires_at: self.codec.clock().now() + self.ttl,
        };
        let token = grant.token.clone();

        let users = self.storage.user_storage();
        let updated = guard::write(
            self.policy,
            "update_user_refresh_token",
            users.update_user_refresh_token(user_id, Some(grant)),
        )
        .await?;

        if !updated {
            return Err(GalleryError::NotFound);
        }

        log_security_event(SecurityEvent::RefreshIssued { user_id }).await;
        Ok(token)
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Unknown and expired tokens fail identically. The refresh token stays
    /// valid until it expires or is overwritten.
    pub async fn redeem(&self, refresh_token: &str) -> Result<AccessToken> {
        if refresh_token.is_empty() || refresh_token.len() > MAX_TOKEN_LENGTH {
            return self.reject(refresh_token).await;
        }

        let users = self.storage.user_storage();
        let holder = guard::read(self.policy, "find_user_by_refresh_token", move || {
            users.find_user_by_refresh_token(refresh_token)
        })
        .await?;

        let now = self.codec.clock().now();
        let user = match holder {
            Some(user) => match &user.refresh {
                Some(grant) if constant_time_eq(&grant.token, refresh_token) && now < grant.expires_at => user,
                _ => return self.reject(refresh_token).await,
            },
            None => return self.reject(refresh_token).await,
        };

        let access = self.codec.issue(&identity_of(&user))?;
        log_security_event(SecurityEvent::RefreshRedeemed { user_id: user.id }).await;
        Ok(access)
    }

    /// Clear the user's refresh token
    pub async fn revoke(&self, user_id: UserId) -> Result<()> {
        let users = self.storage.user_storage();
        guard::write(
            self.policy,
            "update_user_refresh_token",
            users.update_user_refresh_token(user_id, None),
        )
        .await?;

        log_security_event(SecurityEvent::RefreshRevoked { user_id }).await;
        Ok(())
    }

    async fn reject<T>(&self, refresh_token: &str) -> Result<T> {
        log_security_event(SecurityEvent::RefreshRejected {
            fingerprint: token_fingerprint(refresh_token),
        })
        .await;
        Err(GalleryError::InvalidOrExpiredRefreshToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::auth::user::Role;
    use crate::storage::{MemoryStorageProvider, NewUser, UserStorage};
    use chrono::{TimeZone, Utc};

    const SECRET: &str = "7a1c9e3b5d8f2046-refresh-unit-42a9";

    async fn setup() -> (RefreshStore, Arc<MemoryStorageProvider>, ManualClock, UserId) {
        let memory = Arc::new(MemoryStorageProvider::new());
        let user = memory
            .create_user(NewUser {
                email: "u@example.com".to_string(),
                password: "pw".to_string(),
                role: Role::User,
            })
            .await
            .unwrap();

        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let settings = AuthSettings::new(SECRET);
        let codec = Arc::new(TokenCodec::new(&settings, Arc::new(clock.clone())));
        let store = RefreshStore::new(memory.clone(), RepositoryPolicy::default(), codec, &settings);
        (store, memory, clock, user.id)
    }

    #[test]
    fn test_generated_token_shape() {
        let token = generate_refresh_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_refresh_token());
    }

    #[tokio::test]
    async fn test_redeem_is_repeatable_until_expiry() {
        let (store, _, clock, user_id) = setup().await;
        let token = store.issue(user_id).await.unwrap();

        assert!(store.redeem(&token).await.is_ok());
        assert!(store.redeem(&token).await.is_ok());

        clock.advance(chrono::Duration::days(7));
        assert_eq!(
            store.redeem(&token).await.unwrap_err(),
            GalleryError::InvalidOrExpiredRefreshToken
        );
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_token() {
        let (store, _, _, user_id) = setup().await;
        let first = store.issue(user_id).await.unwrap();
        let second = store.issue(user_id).await.unwrap();

        assert_eq!(
            store.redeem(&first).await.unwrap_err(),
            GalleryError::InvalidOrExpiredRefreshToken
        );
        assert!(store.redeem(&second).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_and_unknown_user() {
        let (store, _, _, user_id) = setup().await;
        let token = store.issue(user_id).await.unwrap();
        store.revoke(user_id).await.unwrap();

        assert_eq!(
            store.redeem(&token).await.unwrap_err(),
            GalleryError::InvalidOrExpiredRefreshToken
        );
        assert_eq!(store.issue(9999).await.unwrap_err(), GalleryError::NotFound);
    }

    #[tokio::test]
    async fn test_outage_is_not_reported_as_bad_token() {
        let (store, memory, _, user_id) = setup().await;
        let token = store.issue(user_id).await.unwrap();
        memory.set_available(false);

        assert!(matches!(
            store.redeem(&token).await,
            Err(GalleryError::RepositoryUnavailable(_))
        ));
    }
}
