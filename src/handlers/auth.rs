//! Login, registration, refresh and logout flows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::clock::SharedClock;
use crate::auth::credentials::{hash_password, CredentialVerifier};
use crate::auth::refresh::RefreshStore;
use crate::auth::session::SessionResolver;
use crate::auth::token::TokenCodec;
use crate::auth::user::{Principal, Role, UserId, UserIdentity};
use crate::config::{AuthSettings, RepositoryPolicy};
use crate::error::{GalleryError, Result};
use crate::security::AuthTimer;
use crate::security_logger::{log_security_event, sanitize_for_log, SecurityEvent};
use crate::storage::{guard, NewUser, SharedStorage, StoredUser};

const MAX_EMAIL_LENGTH: usize = 254;
const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Public view of a user record; never carries the password or refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredUser> for UserView {
    fn from(user: &StoredUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    /// Returned once here and also set as an HTTP-only cookie
    pub refresh_token: String,
    pub user: UserIdentity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub(crate) fn validate_email(email: &str) -> Result<String> {
    let email = email.trim();
    let valid_shape = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid_shape || email.len() > MAX_EMAIL_LENGTH || email.chars().any(char::is_whitespace) {
        return Err(GalleryError::ValidationError("Invalid email address".to_string()));
    }
    Ok(email.to_string())
}

pub(crate) fn validate_password(password: &str) -> Result<()> {
    let length = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        return Err(GalleryError::ValidationError(format!(
            "Password must be between {} and {} characters",
            MIN_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Wires the credential verifier, token codec, refresh store and session
/// resolver into the request-level auth flows.
pub struct AuthService {
    storage: SharedStorage,
    policy: RepositoryPolicy,
    verifier: CredentialVerifier,
    codec: Arc<TokenCodec>,
    refresh: RefreshStore,
    resolver: SessionResolver,
    refresh_ttl: chrono::Duration,
    min_auth_duration: Duration,
}

impl AuthService {
    pub fn new(storage: SharedStorage, settings: &AuthSettings, policy: RepositoryPolicy, clock: SharedClock) -> Self {
        let codec = Arc::new(TokenCodec::new(settings, clock));
        Self {
            verifier: CredentialVerifier::new(storage.clone(), policy),
            refresh: RefreshStore::new(storage.clone(), policy, codec.clone(), settings),
            resolver: SessionResolver::new(codec.clone()),
            codec,
            storage,
            policy,
            refresh_ttl: settings.refresh_token_ttl,
            min_auth_duration: settings.min_auth_duration,
        }
    }

    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    /// Lifetime of an issued refresh token, for the cookie `Max-Age`
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl.num_seconds()
    }

    /// Resolve the caller from an `Authorization` header
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<Principal> {
        self.resolver.resolve_header(authorization).await
    }

    /// Verify credentials, mint an access token and issue a fresh refresh token.
    ///
    /// Every attempt takes at least `min_auth_duration`.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let timer = AuthTimer::new(self.min_auth_duration);
        let result = self.login_inner(&request).await;
        timer.wait().await;

        match &result {
            Ok(response) => {
                log_security_event(SecurityEvent::LoginSucceeded { user_id: response.user.id }).await;
            }
            Err(GalleryError::InvalidCredentials) => {
                log_security_event(SecurityEvent::LoginFailed {
                    email: sanitize_for_log(&request.email),
                }).await;
            }
            Err(e) => log::error!("Login could not complete: {}", e),
        }
        result
    }

    async fn login_inner(&self, request: &LoginRequest) -> Result<LoginResponse> {
        let identity = self.verifier.verify(request.email.trim(), &request.password).await?;
        let access = self.codec.issue(&identity)?;
        let refresh_token = self.refresh.issue(identity.id).await?;

        Ok(LoginResponse {
            access_token: access.token,
            token_type: "Bearer".to_string(),
            expires_in: access.expires_in,
            refresh_token,
            user: identity,
        })
    }

    /// Public registration always creates a `USER`
    pub async fn register(&self, request: RegisterRequest) -> Result<UserView> {
        let email = validate_email(&request.email)?;
        validate_password(&request.password)?;
        let password = hash_password(&request.password)?;

        let users = self.storage.user_storage();
        let created = guard::write(
            self.policy,
            "create_user",
            users.create_user(NewUser {
                email,
                password,
                role: Role::User,
            }),
        )
        .await?;

        log::info!("Registered user {}", created.id);
        Ok(UserView::from(&created))
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse> {
        let access = self.refresh.redeem(refresh_token).await?;
        Ok(RefreshResponse {
            access_token: access.token,
            token_type: "Bearer".to_string(),
            expires_in: access.expires_in,
        })
    }

    /// Drop the caller's refresh token. The access token lives out its TTL.
    pub async fn logout(&self, principal: &Principal) -> Result<()> {
        self.refresh.revoke(principal.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert_eq!(validate_email("  a@example.com ").unwrap(), "a@example.com");
        for bad in ["", "plain", "@example.com", "a@localhost", "a b@example.com", "a@.com"] {
            assert!(validate_email(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_password_validation() {
        assert!(validate_password("secret1").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }
}
