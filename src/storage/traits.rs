//! Abstract repository interfaces for pluggable backends
//!
//! The authorization core only ever sees these traits. Every lookup is
//! fallible and answers "found" or "not found"; backend outages surface as
//! `GalleryError::RepositoryUnavailable`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::auth::user::{Role, UserId};
use crate::error::Result;

pub type PhotoshootId = i64;
pub type PhotoId = i64;
pub type CommentId = i64;

/// The single active refresh token of a user, always written as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// User record. Never serialized to clients directly.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub id: UserId,
    pub email: String,
    /// Plaintext for seeded records, Argon2 PHC string for registered ones
    pub password: String,
    pub role: Role,
    pub refresh: Option<RefreshGrant>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPhotoshoot {
    pub id: PhotoshootId,
    pub title: String,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub owner_id: Option<UserId>,
    pub public: bool,
    pub shared_with: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPhotoshoot {
    pub title: String,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub owner_id: Option<UserId>,
    pub public: bool,
    pub shared_with: BTreeSet<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPhoto {
    pub id: PhotoId,
    pub photoshoot_id: PhotoshootId,
    pub filename: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub photoshoot_id: PhotoshootId,
    pub filename: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredComment {
    pub id: CommentId,
    pub photo_id: PhotoId,
    pub author_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub photo_id: PhotoId,
    pub author_id: UserId,
    pub body: String,
}

/// User data storage interface
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Create a new user; emails are unique
    async fn create_user(&self, user: NewUser) -> Result<StoredUser>;

    async fn find_user_by_id(&self, user_id: UserId) -> Result<Option<StoredUser>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<StoredUser>>;

    /// Find the user currently holding this refresh token, expired or not
    async fn find_user_by_refresh_token(&self, token: &str) -> Result<Option<StoredUser>>;

    /// Atomically replace (or clear) the refresh grant. Returns false if the user is gone.
    async fn update_user_refresh_token(&self, user_id: UserId, grant: Option<RefreshGrant>) -> Result<bool>;

    /// Update profile fields; `None` leaves a field untouched
    async fn update_user_profile(
        &self,
        user_id: UserId,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<Option<StoredUser>>;

    /// Delete a user. Their photoshoots become ownerless and they leave every shared-with set.
    async fn delete_user(&self, user_id: UserId) -> Result<bool>;

    async fn list_users(&self) -> Result<Vec<StoredUser>>;
}

/// Photoshoot storage interface
#[async_trait]
pub trait PhotoshootStorage: Send + Sync {
    /// Create a photoshoot; titles are unique
    async fn create_photoshoot(&self, photoshoot: NewPhotoshoot) -> Result<StoredPhotoshoot>;

    async fn find_photoshoot_by_id(&self, id: PhotoshootId) -> Result<Option<StoredPhotoshoot>>;

    async fn list_photoshoots(&self) -> Result<Vec<StoredPhotoshoot>>;

    async fn update_photoshoot(&self, photoshoot: StoredPhotoshoot) -> Result<bool>;

    /// Delete a photoshoot together with its photos and their comments
    async fn delete_photoshoot(&self, id: PhotoshootId) -> Result<bool>;
}

/// Photo storage interface
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    async fn create_photo(&self, photo: NewPhoto) -> Result<StoredPhoto>;

    async fn find_photo_by_id(&self, id: PhotoId) -> Result<Option<StoredPhoto>>;

    async fn list_photos(&self, photoshoot_id: PhotoshootId) -> Result<Vec<StoredPhoto>>;

    async fn update_photo(&self, photo: StoredPhoto) -> Result<bool>;

    /// Delete a photo together with its comments
    async fn delete_photo(&self, id: PhotoId) -> Result<bool>;
}

/// Comment storage interface
#[async_trait]
pub trait CommentStorage: Send + Sync {
    async fn create_comment(&self, comment: NewComment) -> Result<StoredComment>;

    async fn find_comment_by_id(&self, id: CommentId) -> Result<Option<StoredComment>>;

    async fn list_comments(&self, photo_id: PhotoId) -> Result<Vec<StoredComment>>;

    async fn update_comment(&self, comment: StoredComment) -> Result<bool>;

    async fn delete_comment(&self, id: CommentId) -> Result<bool>;
}

/// Combined storage provider interface
#[async_trait]
pub trait StorageProvider: Send + Sync {
    fn user_storage(&self) -> &dyn UserStorage;

    fn photoshoot_storage(&self) -> &dyn PhotoshootStorage;

    fn photo_storage(&self) -> &dyn PhotoStorage;

    fn comment_storage(&self) -> &dyn CommentStorage;

    /// Health check for the storage backend
    async fn health_check(&self) -> Result<bool>;
}

pub type SharedStorage = Arc<dyn StorageProvider>;
