//! Server configuration module
//! Handles the signing secret, token lifetimes and repository policy

use crate::constants::{
    ACCESS_TOKEN_TTL_SECS, DEFAULT_HOST, DEFAULT_MIN_AUTH_DURATION_MS, DEFAULT_PORT,
    DEFAULT_REPOSITORY_READ_RETRIES, DEFAULT_REPOSITORY_TIMEOUT_MS, MIN_SECRET_LENGTH,
    REFRESH_TOKEN_TTL_DAYS,
};
use crate::error::{GalleryError, Result};
use std::env;
use std::time::Duration;

/// Settings shared by the token codec, the refresh store and the login flow.
///
/// Always built explicitly and injected; nothing in the crate reads the
/// signing secret from process state on its own.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// HMAC secret for access token signing/validation
    pub jwt_secret: String,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    /// Lower bound on how long a login attempt takes, success or not
    pub min_auth_duration: Duration,
}

impl AuthSettings {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_token_ttl: chrono::Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: chrono::Duration::days(REFRESH_TOKEN_TTL_DAYS),
            min_auth_duration: Duration::from_millis(DEFAULT_MIN_AUTH_DURATION_MS),
        }
    }

    pub fn with_access_token_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    pub fn with_refresh_token_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    pub fn with_min_auth_duration(mut self, duration: Duration) -> Self {
        self.min_auth_duration = duration;
        self
    }
}

/// Timeout and retry policy for repository calls
#[derive(Debug, Clone, Copy)]
pub struct RepositoryPolicy {
    pub timeout: Duration,
    /// Extra attempts allowed for idempotent reads after an outage
    pub read_retries: u32,
}

impl Default for RepositoryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_REPOSITORY_TIMEOUT_MS),
            read_retries: DEFAULT_REPOSITORY_READ_RETRIES,
        }
    }
}

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub auth: AuthSettings,
    pub repository: RepositoryPolicy,
    /// Development mode (seeds demo accounts, relaxes cookie `Secure` flag)
    pub development_mode: bool,
    /// TLS configuration
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

impl ServerConfig {
    /// Validate that a secret meets security requirements
    pub fn validate_secret(secret: &str) -> Result<()> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(GalleryError::ConfigError(format!(
                "JWT secret must be at least {} characters long",
                MIN_SECRET_LENGTH
            )));
        }

        // Values copied from tutorials and .env templates
        let insecure_patterns = [
            "your-secret-key",
            "change-this",
            "changeme",
            "test-secret",
            "default",
            "secret",
            "password",
            "12345",
        ];

        let lowered = secret.to_lowercase();
        for pattern in &insecure_patterns {
            if lowered.contains(pattern) {
                return Err(GalleryError::ConfigError(format!(
                    "JWT secret contains insecure pattern '{}'. Generate one with: openssl rand -base64 32",
                    pattern
                )));
            }
        }

        if secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(GalleryError::ConfigError(
                "JWT secret should contain mixed characters (letters, numbers, symbols)".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let host = env::var("RUSTY_GALLERY_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = env::var("RUSTY_GALLERY_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let jwt_secret = env::var("RUSTY_GALLERY_JWT_SECRET")
            .or_else(|_| env::var("JWT_SECRET"))
            .map_err(|_| {
                GalleryError::ConfigError(
                    "JWT_SECRET environment variable is required. \
                     Generate one with: openssl rand -base64 32"
                        .to_string(),
                )
            })?;
        Self::validate_secret(&jwt_secret)?;

        let access_ttl_secs = env::var("RUSTY_GALLERY_ACCESS_TTL_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(ACCESS_TOKEN_TTL_SECS);

        let refresh_ttl_days = env::var("RUSTY_GALLERY_REFRESH_TTL_DAYS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(REFRESH_TOKEN_TTL_DAYS);

        if access_ttl_secs <= 0 || refresh_ttl_days <= 0 {
            return Err(GalleryError::ConfigError(
                "Token lifetimes must be positive".to_string(),
            ));
        }

        let min_auth_ms = env::var("RUSTY_GALLERY_MIN_AUTH_MS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(DEFAULT_MIN_AUTH_DURATION_MS);

        let repository_timeout_ms = env::var("RUSTY_GALLERY_REPOSITORY_TIMEOUT_MS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(DEFAULT_REPOSITORY_TIMEOUT_MS);

        let read_retries = env::var("RUSTY_GALLERY_REPOSITORY_READ_RETRIES")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(DEFAULT_REPOSITORY_READ_RETRIES);

        let development_mode = env::var("RUSTY_GALLERY_DEVELOPMENT_MODE")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false); // SECURITY: Default to false (production mode)

        let tls_cert_path = env::var("RUSTY_GALLERY_TLS_CERT_PATH").ok();
        let tls_key_path = env::var("RUSTY_GALLERY_TLS_KEY_PATH").ok();

        match (&tls_cert_path, &tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                if !std::path::Path::new(cert_path).exists() {
                    return Err(GalleryError::ConfigError(format!(
                        "TLS certificate file does not exist: {}",
                        cert_path
                    )));
                }
                if !std::path::Path::new(key_path).exists() {
                    return Err(GalleryError::ConfigError(format!(
                        "TLS private key file does not exist: {}",
                        key_path
                    )));
                }
            }
            (None, None) => {}
            _ => {
                return Err(GalleryError::ConfigError(
                    "RUSTY_GALLERY_TLS_CERT_PATH and RUSTY_GALLERY_TLS_KEY_PATH must be set together"
                        .to_string(),
                ));
            }
        }

        let auth = AuthSettings::new(jwt_secret)
            .with_access_token_ttl(chrono::Duration::seconds(access_ttl_secs))
            .with_refresh_token_ttl(chrono::Duration::days(refresh_ttl_days))
            .with_min_auth_duration(Duration::from_millis(min_auth_ms));

        Ok(Self {
            host,
            port,
            auth,
            repository: RepositoryPolicy {
                timeout: Duration::from_millis(repository_timeout_ms),
                read_retries,
            },
            development_mode,
            tls_cert_path,
            tls_key_path,
        })
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls_cert_path.is_some() && self.tls_key_path.is_some()
    }
}
