use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

use rusty_gallery::auth::{Clock, ManualClock, Role, TokenCodec, UserIdentity};
use rusty_gallery::config::{AuthSettings, RepositoryPolicy, ServerConfig};
use rusty_gallery::handlers::auth::{LoginRequest, RegisterRequest};
use rusty_gallery::handlers::AuthService;
use rusty_gallery::storage::{create_memory_storage, seed_demo_data, MemoryStorageProvider, StorageProvider};
use rusty_gallery::GalleryError;

const SECRET: &str = "7f3a9c1e-integration-4b8d2e6f0a15c9";

fn settings() -> AuthSettings {
    AuthSettings::new(SECRET).with_min_auth_duration(std::time::Duration::ZERO)
}

async fn setup() -> (AuthService, Arc<MemoryStorageProvider>, ManualClock) {
    let storage = create_memory_storage();
    seed_demo_data(storage.as_ref()).await.unwrap();

    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
    let service = AuthService::new(
        storage.clone(),
        &settings(),
        RepositoryPolicy::default(),
        Arc::new(clock.clone()),
    );
    (service, storage, clock)
}

fn login(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

#[tokio::test]
async fn test_login_with_seeded_account() {
    let (service, _, _) = setup().await;

    let response = service.login(login("user@example.com", "user123")).await.unwrap();
    assert_eq!(response.token_type, "Bearer");
    assert_eq!(response.expires_in, 900);
    assert_eq!(response.user.email, "user@example.com");
    assert_eq!(response.user.role, Role::User);
    assert_eq!(response.refresh_token.len(), 64);

    let principal = service
        .authenticate(Some(&bearer(&response.access_token)))
        .await
        .unwrap();
    assert_eq!(principal.id, response.user.id);
    assert_eq!(principal.role, Role::User);
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_look_the_same() {
    let (service, _, _) = setup().await;

    let unknown = service.login(login("nobody@example.com", "user123")).await;
    let wrong = service.login(login("user@example.com", "user124")).await;

    assert_eq!(unknown.unwrap_err(), GalleryError::InvalidCredentials);
    assert_eq!(wrong.unwrap_err(), GalleryError::InvalidCredentials);
}

#[tokio::test]
async fn test_access_token_expires_and_refresh_restores_access() {
    let (service, _, clock) = setup().await;
    let response = service.login(login("admin@example.com", "admin123")).await.unwrap();
    let header = bearer(&response.access_token);

    clock.advance(Duration::seconds(899));
    assert!(service.authenticate(Some(&header)).await.is_ok());

    clock.advance(Duration::seconds(1));
    assert_eq!(
        service.authenticate(Some(&header)).await.unwrap_err(),
        GalleryError::Unauthenticated
    );

    let refreshed = service.refresh(&response.refresh_token).await.unwrap();
    assert_eq!(refreshed.expires_in, 900);
    let principal = service
        .authenticate(Some(&bearer(&refreshed.access_token)))
        .await
        .unwrap();
    assert_eq!(principal.id, response.user.id);
    assert_eq!(principal.role, Role::Admin);

    // The new token has a full window of its own
    let claims = service.codec().decode(&refreshed.access_token).unwrap();
    assert_eq!(claims.exp - claims.iat, 900);
    assert_eq!(claims.iat, clock.now().timestamp());
}

#[tokio::test]
async fn test_refresh_token_expires_after_seven_days() {
    let (service, _, clock) = setup().await;
    let response = service.login(login("user@example.com", "user123")).await.unwrap();

    clock.advance(Duration::days(7) - Duration::seconds(1));
    assert!(service.refresh(&response.refresh_token).await.is_ok());

    clock.advance(Duration::seconds(1));
    assert_eq!(
        service.refresh(&response.refresh_token).await.unwrap_err(),
        GalleryError::InvalidOrExpiredRefreshToken
    );
}

#[tokio::test]
async fn test_new_login_replaces_refresh_token() {
    let (service, _, _) = setup().await;
    let first = service.login(login("user@example.com", "user123")).await.unwrap();
    let second = service.login(login("user@example.com", "user123")).await.unwrap();

    assert_ne!(first.refresh_token, second.refresh_token);
    assert!(service.refresh(&first.refresh_token).await.is_err());
    assert!(service.refresh(&second.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let (service, _, _) = setup().await;
    let response = service.login(login("user@example.com", "user123")).await.unwrap();
    let principal = service
        .authenticate(Some(&bearer(&response.access_token)))
        .await
        .unwrap();

    service.logout(&principal).await.unwrap();

    assert_eq!(
        service.refresh(&response.refresh_token).await.unwrap_err(),
        GalleryError::InvalidOrExpiredRefreshToken
    );
    // Access tokens are stateless and survive until they expire
    assert!(service
        .authenticate(Some(&bearer(&response.access_token)))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_garbage_refresh_tokens_rejected() {
    let (service, _, _) = setup().await;
    let tokens = vec![
        String::new(),
        "not-a-token".to_string(),
        "a".repeat(64),
        "b".repeat(4096),
    ];
    for token in &tokens {
        assert_eq!(
            service.refresh(token).await.unwrap_err(),
            GalleryError::InvalidOrExpiredRefreshToken
        );
    }
}

#[tokio::test]
async fn test_token_signed_with_other_secret_rejected() {
    let (service, _, clock) = setup().await;
    let foreign = TokenCodec::new(
        &AuthSettings::new("0d9e8c7b-another-signing-key-6a5f4e3d"),
        Arc::new(clock.clone()),
    );
    let token = foreign
        .issue(&UserIdentity {
            id: 1,
            email: "admin@example.com".to_string(),
            role: Role::Admin,
        })
        .unwrap();

    assert_eq!(
        service.authenticate(Some(&bearer(&token.token))).await.unwrap_err(),
        GalleryError::Unauthenticated
    );
}

#[tokio::test]
async fn test_missing_or_malformed_header_is_unauthenticated() {
    let (service, _, _) = setup().await;
    for header in [None, Some(""), Some("Bearer"), Some("Basic dXNlcjpwYXNz"), Some("Bearer a.b.c")] {
        assert_eq!(
            service.authenticate(header).await.unwrap_err(),
            GalleryError::Unauthenticated,
            "{:?}",
            header
        );
    }
}

#[tokio::test]
async fn test_registered_user_logs_in_with_hashed_password() {
    let (service, storage, _) = setup().await;

    let created = service
        .register(RegisterRequest {
            email: "new@example.com".to_string(),
            password: "hunter22".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(created.role, Role::User);

    let stored = storage
        .user_storage()
        .find_user_by_id(created.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.password.starts_with("$argon2"));

    let response = service.login(login("new@example.com", "hunter22")).await.unwrap();
    assert_eq!(response.user.id, created.id);
    assert!(service.login(login("new@example.com", "hunter23")).await.is_err());
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let (service, _, _) = setup().await;
    let result = service
        .register(RegisterRequest {
            email: "USER@example.com".to_string(),
            password: "another1".to_string(),
        })
        .await;
    assert!(matches!(result, Err(GalleryError::ConflictError(_))));
}

#[tokio::test]
async fn test_repository_outage_is_not_a_credential_failure() {
    let (service, storage, _) = setup().await;
    storage.set_available(false);

    let result = service.login(login("user@example.com", "user123")).await;
    assert!(matches!(result, Err(GalleryError::RepositoryUnavailable(_))));

    storage.set_available(true);
    assert!(service.login(login("user@example.com", "user123")).await.is_ok());
}

#[test]
fn test_weak_secrets_rejected() {
    assert!(ServerConfig::validate_secret("short").is_err());
    assert!(ServerConfig::validate_secret("my-default-jwt-value-that-is-long-enough").is_err());
    assert!(ServerConfig::validate_secret("abcdefghijklmnopqrstuvwxyzabcdefgh").is_err());
    assert!(ServerConfig::validate_secret(SECRET).is_ok());
}
