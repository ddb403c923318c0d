//! Rusty Gallery - authentication and layered authorization for a photo gallery
//!
//! Users own photoshoots, share them read-only with other users or make them
//! public; photos and comments inherit visibility from their photoshoot.
//! Access tokens are short-lived HS256 JWTs, refresh tokens are opaque and
//! stored server-side.

pub mod auth;
pub mod authz;
pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod security;
pub mod security_logger;
pub mod storage;

// Re-export main components
pub use config::{AuthSettings, RepositoryPolicy, ServerConfig};
pub use error::{Denial, GalleryError, Result};
