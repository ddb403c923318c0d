// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3030;
pub const API_PREFIX: &str = "api";

// Token lifetimes
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;
pub const REFRESH_TOKEN_BYTES: usize = 32;
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

// Credential limits
pub const MIN_SECRET_LENGTH: usize = 32;
pub const MAX_TOKEN_LENGTH: usize = 1000;
pub const DEFAULT_MIN_AUTH_DURATION_MS: u64 = 100;

// Repository collaborator policy
pub const DEFAULT_REPOSITORY_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_REPOSITORY_READ_RETRIES: u32 = 2;

// Longest client-supplied string echoed into the security log
pub const MAX_LOGGED_INPUT: usize = 128;
