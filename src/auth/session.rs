//! Turns a presented credential into a `Principal`

use std::sync::Arc;

use crate::auth::token::{extract_bearer_token, TokenCodec};
use crate::auth::user::Principal;
use crate::constants::MAX_TOKEN_LENGTH;
use crate::error::{GalleryError, Result};

/// The single place deciding whether a request has a valid caller.
///
/// Runs before any resource lookup, so an unauthenticated caller learns
/// nothing about what exists.
pub struct SessionResolver {
    codec: Arc<TokenCodec>,
}

impl SessionResolver {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    /// Resolve a raw access token
    pub async fn resolve(&self, token: Option<&str>) -> Result<Principal> {
        let token = token.ok_or(GalleryError::Unauthenticated)?;

        if token.len() > MAX_TOKEN_LENGTH || token.chars().any(|c| c.is_control()) {
            log::warn!("Rejected malformed access token ({} bytes)", token.len());
            return Err(GalleryError::Unauthenticated);
        }

        let claims = self
            .codec
            .decode_logged(token)
            .await
            .map_err(|_| GalleryError::Unauthenticated)?;

        claims.principal().map_err(|_| GalleryError::Unauthenticated)
    }

    /// Resolve from an `Authorization` header value
    pub async fn resolve_header(&self, authorization: Option<&str>) -> Result<Principal> {
        self.resolve(authorization.and_then(extract_bearer_token)).await
    }
}
