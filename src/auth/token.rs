use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::clock::SharedClock;
use crate::auth::user::{Principal, Role, UserId, UserIdentity};
use crate::config::AuthSettings;
use crate::error::{GalleryError, Result};
use crate::security_logger::{log_security_event, token_fingerprint, SecurityEvent};

/// JWT Claims structure
///
/// Only non-sensitive identity data. The payload is readable by the client,
/// so it never carries a refresh token or any other secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Issued at (as UTC timestamp)
    pub iat: i64,
    /// Expiration time (as UTC timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn for_identity(identity: &UserIdentity, issued_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            role: identity.role,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }

    pub fn user_id(&self) -> Result<UserId> {
        self.sub
            .parse::<UserId>()
            .map_err(|_| GalleryError::InvalidOrExpiredToken)
    }

    pub fn principal(&self) -> Result<Principal> {
        Ok(Principal::new(self.user_id()?, self.role))
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A freshly minted access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Seconds until expiry at the moment of issue
    pub expires_in: i64,
}

/// Signs and verifies access tokens with a single HMAC-SHA256 secret
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
    clock: SharedClock,
}

impl TokenCodec {
    pub fn new(settings: &AuthSettings, clock: SharedClock) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock with no leeway
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iat"]);

        Self {
            encoding_key: EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
            validation,
            ttl: settings.access_token_ttl,
            clock,
        }
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Sign the given claims
    pub fn encode(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| GalleryError::ConfigError(format!("Failed to sign token: {}", e)))
    }

    /// Mint an access token for a verified identity, valid for the configured TTL
    pub fn issue(&self, identity: &UserIdentity) -> Result<AccessToken> {
        let now = self.clock.now();
        let claims = Claims::for_identity(identity, now, self.ttl);
        let token = self.encode(&claims)?;

        Ok(AccessToken {
            token,
            expires_at: claims.expires_at(),
            expires_in: claims.exp - claims.iat,
        })
    }

    /// Verify signature and expiry. Every failure looks the same to the caller.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let claims = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                log::debug!("Token rejected: {}", e);
                return Err(GalleryError::InvalidOrExpiredToken);
            }
        };

        if self.clock.now().timestamp() >= claims.exp {
            log::debug!("Token rejected: expired at {}", claims.exp);
            return Err(GalleryError::InvalidOrExpiredToken);
        }

        Ok(claims)
    }

    /// `decode` plus a security event on failure
    pub async fn decode_logged(&self, token: &str) -> Result<Claims> {
        let result = self.decode(token);
        if result.is_err() {
            log_security_event(SecurityEvent::TokenRejected {
                fingerprint: token_fingerprint(token),
            })
            .await;
        }
        result
    }
}

/// Extracts bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use std::sync::Arc;

    const SECRET: &str = "0f8e7d6c5b4a39281706f5e4d3c2b1a0-unit";

    fn identity() -> UserIdentity {
        UserIdentity {
            id: 42,
            email: "owner@example.com".to_string(),
            role: Role::User,
        }
    }

    fn codec_at(start: DateTime<Utc>) -> (TokenCodec, ManualClock) {
        let clock = ManualClock::new(start);
        let codec = TokenCodec::new(&AuthSettings::new(SECRET), Arc::new(clock.clone()));
        (codec, clock)
    }

    #[test]
    fn test_issue_and_decode() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let (codec, _) = codec_at(start);

        let issued = codec.issue(&identity()).unwrap();
        assert_eq!(issued.expires_in, 900);

        let claims = codec.decode(&issued.token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "owner@example.com");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(claims.principal().unwrap(), Principal::new(42, Role::User));
    }

    #[test]
    fn test_expiry_boundary_is_strict() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let (codec, clock) = codec_at(start);
        let issued = codec.issue(&identity()).unwrap();

        clock.set(start + chrono::Duration::seconds(899));
        assert!(codec.decode(&issued.token).is_ok());

        clock.set(start + chrono::Duration::seconds(900));
        assert_eq!(codec.decode(&issued.token), Err(GalleryError::InvalidOrExpiredToken));
    }

    #[test]
    fn test_tampered_and_garbage_tokens_fail_uniformly() {
        let (codec, _) = codec_at(Utc::now());
        let issued = codec.issue(&identity()).unwrap();

        let mut tampered = issued.token.clone();
        tampered.push('x');

        for token in [tampered.as_str(), "not-a-jwt", ""] {
            assert_eq!(codec.decode(token), Err(GalleryError::InvalidOrExpiredToken));
        }
    }

    #[test]
    fn test_payload_carries_no_refresh_field() {
        let (codec, _) = codec_at(Utc::now());
        let claims = Claims::for_identity(&identity(), Utc::now(), chrono::Duration::minutes(15));
        let value = serde_json::to_value(&claims).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 5);
        assert!(value.get("refresh_token").is_none());
        assert!(codec.encode(&claims).is_ok());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }
}
