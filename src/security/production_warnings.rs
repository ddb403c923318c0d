//! Startup warnings for configurations that should not reach production

use crate::config::ServerConfig;
use crate::security_logger::{log_security_event, SecurityEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductionWarning {
    /// Demo accounts are seeded and the refresh cookie loses `Secure`
    DevelopmentModeEnabled,
    /// Tokens would travel over plain HTTP
    InsecureTransport,
    /// Debug logging may print request details
    DebugLoggingEnabled,
    /// Access tokens live longer than the recommended 15 minutes
    LongLivedAccessTokens { seconds: i64 },
}

impl ProductionWarning {
    fn describe(&self) -> (&'static str, String) {
        match self {
            ProductionWarning::DevelopmentModeEnabled => {
                ("server", "Development mode is enabled in production environment".to_string())
            }
            ProductionWarning::InsecureTransport => {
                ("tls", "TLS certificate or key not configured".to_string())
            }
            ProductionWarning::DebugLoggingEnabled => {
                ("logging", "Debug logging is enabled in production".to_string())
            }
            ProductionWarning::LongLivedAccessTokens { seconds } => {
                ("jwt", format!("Access token lifetime of {}s exceeds 900s", seconds))
            }
        }
    }
}

/// Whether `RUST_ENV`/`ENVIRONMENT` names a production deployment
pub fn is_production_environment(environment: &str) -> bool {
    matches!(environment.to_lowercase().as_str(), "production" | "prod" | "release")
}

/// Inspect a loaded configuration. `rust_log` is the value of `RUST_LOG`.
pub fn check_production_readiness(config: &ServerConfig, rust_log: &str) -> Vec<ProductionWarning> {
    let mut warnings = Vec::new();

    if config.development_mode {
        warnings.push(ProductionWarning::DevelopmentModeEnabled);
    }
    if !config.tls_enabled() {
        warnings.push(ProductionWarning::InsecureTransport);
    }
    if rust_log.contains("debug") || rust_log.contains("trace") {
        warnings.push(ProductionWarning::DebugLoggingEnabled);
    }

    let access_ttl = config.auth.access_token_ttl.num_seconds();
    if access_ttl > 900 {
        warnings.push(ProductionWarning::LongLivedAccessTokens { seconds: access_ttl });
    }

    warnings
}

/// Log every warning when running in production
pub async fn report_production_warnings(config: &ServerConfig) -> Vec<ProductionWarning> {
    let environment = std::env::var("RUST_ENV")
        .or_else(|_| std::env::var("ENVIRONMENT"))
        .unwrap_or_else(|_| "development".to_string());

    if !is_production_environment(&environment) {
        return Vec::new();
    }

    log::warn!("PRODUCTION MODE DETECTED - Environment: {}", environment);
    let rust_log = std::env::var("RUST_LOG").unwrap_or_default();
    let warnings = check_production_readiness(config, &rust_log);

    for warning in &warnings {
        let (component, message) = warning.describe();
        log::error!("PRODUCTION WARNING: {} - {}", component, message);
        log_security_event(SecurityEvent::ConfigurationError {
            component: component.to_string(),
            error: message,
        })
        .await;
    }

    if warnings.is_empty() {
        log::info!("Production security check passed");
    } else {
        log::error!("Production security check found {} warning(s)", warnings.len());
    }
    warnings
}
