use log::{error, info, warn};
use std::net::SocketAddr;

use rusty_gallery::auth::clock::system_clock;
use rusty_gallery::config::ServerConfig;
use rusty_gallery::handlers::{routes, AppState};
use rusty_gallery::security::report_production_warnings;
use rusty_gallery::security_logger::{init_security_logger, log_security_event, SecurityEvent};
use rusty_gallery::storage::{create_memory_storage, seed_demo_data};

#[tokio::main]
async fn main() {
    // Initialize env
    let dotenv_result = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv_result {
        Ok(_) => info!("Environment variables loaded from .env file"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    init_security_logger();

    // Load config from environment
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            log_security_event(SecurityEvent::ConfigurationError {
                component: "config".to_string(),
                error: e.to_string(),
            })
            .await;
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, access_ttl={}s, development_mode={}",
        config.host,
        config.port,
        config.auth.access_token_ttl.num_seconds(),
        config.development_mode
    );
    report_production_warnings(&config).await;

    let storage = create_memory_storage();
    if config.development_mode {
        warn!("Development mode: seeding demo accounts with well-known passwords");
        if let Err(e) = seed_demo_data(storage.as_ref()).await {
            error!("Failed to seed demo data: {}", e);
            std::process::exit(1);
        }
    }

    let state = AppState::new(
        storage,
        &config.auth,
        config.repository,
        system_clock(),
        config.development_mode,
    );
    let routes = routes(state);

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    match (&config.tls_cert_path, &config.tls_key_path) {
        (Some(cert_path), Some(key_path)) => {
            info!("Starting Rusty Gallery server on https://{}", addr);
            warp::serve(routes)
                .tls()
                .cert_path(cert_path)
                .key_path(key_path)
                .run(addr)
                .await;
        }
        _ => {
            info!("Starting Rusty Gallery server on http://{}", addr);
            warp::serve(routes).run(addr).await;
        }
    }
}
