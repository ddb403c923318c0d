use std::error::Error;
use std::fmt;

use warp::http::StatusCode;

/// The three outcomes a rejected request can surface to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Denial {
    Unauthenticated,
    Forbidden,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryError {
    // Credential errors
    InvalidCredentials,
    InvalidOrExpiredToken,
    InvalidOrExpiredRefreshToken,

    // Caller-facing authorization outcomes
    Unauthenticated,
    Forbidden,
    NotFound,

    // Repository collaborator errors
    RepositoryUnavailable(String),
    Timeout,

    // Input errors
    ValidationError(String),
    ConflictError(String),

    // Configuration errors
    ConfigError(String),
}

impl GalleryError {
    /// Collapse the error onto the caller-facing surface, if it belongs there.
    ///
    /// Credential failures are authentication failures from the caller's
    /// point of view; repository and input errors have no denial mapping.
    pub fn denial(&self) -> Option<Denial> {
        match self {
            Self::InvalidCredentials
            | Self::InvalidOrExpiredToken
            | Self::InvalidOrExpiredRefreshToken
            | Self::Unauthenticated => Some(Denial::Unauthenticated),
            Self::Forbidden => Some(Denial::Forbidden),
            Self::NotFound => Some(Denial::NotFound),
            _ => None,
        }
    }

    /// Only collaborator outages may be retried, and only for idempotent reads.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RepositoryUnavailable(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self.denial() {
            Some(Denial::Unauthenticated) => StatusCode::UNAUTHORIZED,
            Some(Denial::Forbidden) => StatusCode::FORBIDDEN,
            Some(Denial::NotFound) => StatusCode::NOT_FOUND,
            None => match self {
                Self::RepositoryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
                Self::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
                Self::ConflictError(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl fmt::Display for GalleryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::InvalidOrExpiredToken => write!(f, "Invalid or expired token"),
            Self::InvalidOrExpiredRefreshToken => write!(f, "Invalid or expired refresh token"),
            Self::Unauthenticated => write!(f, "Unauthenticated"),
            Self::Forbidden => write!(f, "Forbidden: insufficient permissions"),
            Self::NotFound => write!(f, "Not found"),
            Self::RepositoryUnavailable(msg) => write!(f, "Repository unavailable: {}", msg),
            Self::Timeout => write!(f, "Repository operation timed out"),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::ConflictError(msg) => write!(f, "Conflict: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for GalleryError {}

// Generic result type for the gallery core
pub type Result<T> = std::result::Result<T, GalleryError>;
