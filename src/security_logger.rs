//! Security-focused logging module to track authentication and authorization events
//!
//! Tokens never reach the log in clear text; they are reduced to a short
//! SHA-256 fingerprint first.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::auth::user::UserId;
use crate::constants::MAX_LOGGED_INPUT;
use crate::error::Denial;

/// Types of security events to track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    // Authentication events
    LoginFailed { email: String },
    LoginSucceeded { user_id: UserId },
    TokenRejected { fingerprint: String },

    // Refresh token lifecycle
    RefreshIssued { user_id: UserId },
    RefreshRedeemed { user_id: UserId },
    RefreshRejected { fingerprint: String },
    RefreshRevoked { user_id: UserId },

    // Authorization events
    PermissionDenied { user_id: UserId, action: String, resource: String },
    ResourceHidden { user_id: UserId, action: String, resource: String },

    // Collaborator health
    RepositoryFailure { operation: String, error: String },

    // System security
    ConfigurationError { component: String, error: String },
}

impl SecurityEvent {
    /// Build the matching authorization event for an engine denial
    pub fn for_denial(denial: Denial, user_id: UserId, action: &str, resource: String) -> Option<Self> {
        match denial {
            Denial::Forbidden => Some(SecurityEvent::PermissionDenied {
                user_id,
                action: action.to_string(),
                resource,
            }),
            Denial::NotFound => Some(SecurityEvent::ResourceHidden {
                user_id,
                action: action.to_string(),
                resource,
            }),
            Denial::Unauthenticated => None,
        }
    }

    fn key(&self) -> &'static str {
        match self {
            SecurityEvent::LoginFailed { .. } => "login_failed",
            SecurityEvent::LoginSucceeded { .. } => "login_succeeded",
            SecurityEvent::TokenRejected { .. } => "token_rejected",
            SecurityEvent::RefreshIssued { .. } => "refresh_issued",
            SecurityEvent::RefreshRedeemed { .. } => "refresh_redeemed",
            SecurityEvent::RefreshRejected { .. } => "refresh_rejected",
            SecurityEvent::RefreshRevoked { .. } => "refresh_revoked",
            SecurityEvent::PermissionDenied { .. } => "permission_denied",
            SecurityEvent::ResourceHidden { .. } => "resource_hidden",
            SecurityEvent::RepositoryFailure { .. } => "repository_failure",
            SecurityEvent::ConfigurationError { .. } => "config_error",
        }
    }
}

/// Short, non-reversible identifier for a bearer or refresh token
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..6])
}

/// Client-supplied text made safe for a single log line: control
/// characters are dropped and the result is capped at `MAX_LOGGED_INPUT` chars.
pub fn sanitize_for_log(input: &str) -> String {
    let mut cleaned: String = input
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_LOGGED_INPUT)
        .collect();
    if input.chars().filter(|c| !c.is_control()).count() > MAX_LOGGED_INPUT {
        cleaned.push_str("...");
    }
    cleaned
}

/// Security event with timestamp
#[derive(Debug, Clone)]
struct TimestampedEvent {
    event: SecurityEvent,
    timestamp: Instant,
}

/// Security logger for tracking and alerting on security events
pub struct SecurityLogger {
    events: Arc<RwLock<Vec<TimestampedEvent>>>,
    event_counts: Arc<RwLock<HashMap<&'static str, usize>>>,
    max_events: usize,
    alert_thresholds: HashMap<&'static str, usize>,
}

impl SecurityLogger {
    pub fn new() -> Self {
        let mut alert_thresholds = HashMap::new();
        alert_thresholds.insert("login_failed", 5);
        alert_thresholds.insert("token_rejected", 10);
        alert_thresholds.insert("refresh_rejected", 5);
        alert_thresholds.insert("permission_denied", 20);
        alert_thresholds.insert("resource_hidden", 20);
        alert_thresholds.insert("repository_failure", 3);
        alert_thresholds.insert("config_error", 1);

        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            event_counts: Arc::new(RwLock::new(HashMap::new())),
            max_events: 10000,
            alert_thresholds,
        }
    }

    /// Log a security event
    pub async fn log_event(&self, event: SecurityEvent) {
        let key = event.key();

        {
            let mut events = self.events.write().await;
            events.push(TimestampedEvent {
                event: event.clone(),
                timestamp: Instant::now(),
            });

            if events.len() > self.max_events {
                let excess = events.len() - self.max_events;
                events.drain(0..excess);
            }
        }

        {
            let mut counts = self.event_counts.write().await;
            let count = counts.entry(key).or_insert(0);
            *count += 1;

            if let Some(&threshold) = self.alert_thresholds.get(key) {
                if *count >= threshold {
                    log::error!("SECURITY ALERT: {} events of type '{}' detected", count, key);
                    log::error!("Sample event: {:?}", event);
                    *count = 0;
                }
            }
        }

        match event {
            SecurityEvent::LoginFailed { email } => {
                log::warn!("SECURITY: Login failed - Email: {}", email);
            }
            SecurityEvent::LoginSucceeded { user_id } => {
                log::info!("SECURITY: Login succeeded - User: {}", user_id);
            }
            SecurityEvent::TokenRejected { fingerprint } => {
                log::warn!("SECURITY: Access token rejected - Token: {}", fingerprint);
            }
            SecurityEvent::RefreshIssued { user_id } => {
                log::info!("SECURITY: Refresh token issued - User: {}", user_id);
            }
            SecurityEvent::RefreshRedeemed { user_id } => {
                log::info!("SECURITY: Refresh token redeemed - User: {}", user_id);
            }
            SecurityEvent::RefreshRejected { fingerprint } => {
                log::warn!("SECURITY: Refresh token rejected - Token: {}", fingerprint);
            }
            SecurityEvent::RefreshRevoked { user_id } => {
                log::info!("SECURITY: Refresh token revoked - User: {}", user_id);
            }
            SecurityEvent::PermissionDenied { user_id, action, resource } => {
                log::warn!(
                    "SECURITY: Permission denied - User: {}, Action: {}, Resource: {}",
                    user_id, action, resource
                );
            }
            SecurityEvent::ResourceHidden { user_id, action, resource } => {
                log::info!(
                    "SECURITY: Resource hidden from caller - User: {}, Action: {}, Resource: {}",
                    user_id, action, resource
                );
            }
            SecurityEvent::RepositoryFailure { operation, error } => {
                log::error!("SECURITY: Repository failure - Operation: {}, Error: {}", operation, error);
            }
            SecurityEvent::ConfigurationError { component, error } => {
                log::error!("SECURITY: Configuration error - Component: {}, Error: {}", component, error);
            }
        }
    }

    /// Get recent security events
    pub async fn get_recent_events(&self, window: Duration) -> Vec<SecurityEvent> {
        let events = self.events.read().await;
        let now = Instant::now();

        events
            .iter()
            .filter(|event| now.duration_since(event.timestamp) <= window)
            .map(|event| event.event.clone())
            .collect()
    }

    /// Counters since the last alert for each event kind
    pub async fn get_event_stats(&self) -> HashMap<&'static str, usize> {
        self.event_counts.read().await.clone()
    }

    pub async fn cleanup_old_events(&self, max_age: Duration) {
        let mut events = self.events.write().await;
        let now = Instant::now();
        events.retain(|event| now.duration_since(event.timestamp) <= max_age);
    }

    /// Start periodic cleanup task
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                self.cleanup_old_events(Duration::from_secs(3600 * 24)).await;
            }
        });
    }
}

impl Default for SecurityLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// Global security logger instance
static SECURITY_LOGGER: OnceLock<Arc<SecurityLogger>> = OnceLock::new();

/// Initialize the global security logger. Must run inside a tokio runtime.
pub fn init_security_logger() {
    SECURITY_LOGGER.get_or_init(|| {
        let logger = Arc::new(SecurityLogger::new());
        logger.clone().start_cleanup_task();
        logger
    });
}

pub fn get_security_logger() -> Option<Arc<SecurityLogger>> {
    SECURITY_LOGGER.get().cloned()
}

/// Log a security event using the global logger, if one was initialized
pub async fn log_security_event(event: SecurityEvent) {
    if let Some(logger) = get_security_logger() {
        logger.log_event(event).await;
    }
}
