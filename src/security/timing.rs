//! Timing attack protection utilities
//!
//! Credential and refresh-token comparisons go through these helpers so that
//! a mismatch in the first byte costs the same as a mismatch in the last.

use std::time::{Duration, Instant};

/// Constant-time byte comparison. Length is not secret.
pub fn constant_time_eq_bytes(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (byte_a, byte_b) in a.iter().zip(b.iter()) {
        diff |= byte_a ^ byte_b;
    }

    diff == 0
}

/// Constant-time string comparison
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    constant_time_eq_bytes(a.as_bytes(), b.as_bytes())
}

/// Pads an authentication attempt to a minimum wall-clock duration so that
/// "unknown email" and "wrong password" are indistinguishable by latency.
pub struct AuthTimer {
    start: Instant,
    min_duration: Duration,
}

impl AuthTimer {
    pub fn new(min_duration: Duration) -> Self {
        Self {
            start: Instant::now(),
            min_duration,
        }
    }

    /// Wait until minimum duration has elapsed
    pub async fn wait(self) {
        let elapsed = self.start.elapsed();
        if elapsed < self.min_duration {
            tokio::time::sleep(self.min_duration - elapsed).await;
        }
    }
}
