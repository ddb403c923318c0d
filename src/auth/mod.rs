//! Authentication: credentials, access tokens, refresh tokens and sessions

pub mod clock;
pub mod credentials;
pub mod refresh;
pub mod session;
pub mod token;
pub mod user;

// Re-export main components
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use credentials::{hash_password, CredentialVerifier};
pub use refresh::RefreshStore;
pub use session::SessionResolver;
pub use token::{AccessToken, Claims, TokenCodec};
pub use user::{Principal, Role, UserId, UserIdentity};
