//! In-memory storage implementation for development and testing
//!
//! All tables live behind one lock so cascade deletes and refresh-token
//! upserts are atomic. Availability and latency can be degraded on purpose
//! to exercise outage and timeout handling.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::traits::*;
use crate::auth::user::UserId;
use crate::error::{GalleryError, Result};
use crate::security::constant_time_eq;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, StoredUser>,
    photoshoots: HashMap<PhotoshootId, StoredPhotoshoot>,
    photos: HashMap<PhotoId, StoredPhoto>,
    comments: HashMap<CommentId, StoredComment>,
    next_id: i64,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn title_taken(&self, title: &str, except: Option<PhotoshootId>) -> bool {
        self.photoshoots
            .values()
            .any(|p| p.title == title && Some(p.id) != except)
    }

    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != except)
    }

    fn remove_photo_cascade(&mut self, photo_id: PhotoId) -> bool {
        let removed = self.photos.remove(&photo_id).is_some();
        if removed {
            self.comments.retain(|_, c| c.photo_id != photo_id);
        }
        removed
    }
}

pub struct MemoryStorageProvider {
    tables: Arc<RwLock<Tables>>,
    available: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryStorageProvider {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Simulate a backend outage (or recovery)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Add artificial latency to every call
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    async fn gate(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(GalleryError::RepositoryUnavailable(
                "memory backend marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryStorageProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for MemoryStorageProvider {
    fn user_storage(&self) -> &dyn UserStorage {
        self
    }

    fn photoshoot_storage(&self) -> &dyn PhotoshootStorage {
        self
    }

    fn photo_storage(&self) -> &dyn PhotoStorage {
        self
    }

    fn comment_storage(&self) -> &dyn CommentStorage {
        self
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.gate().await.is_ok())
    }
}

#[async_trait]
impl UserStorage for MemoryStorageProvider {
    async fn create_user(&self, user: NewUser) -> Result<StoredUser> {
        self.gate().await?;
        let mut tables = self.tables.write().await;

        if tables.email_taken(&user.email, None) {
            return Err(GalleryError::ConflictError("Email already exists".to_string()));
        }

        let id = tables.allocate_id();
        let stored = StoredUser {
            id,
            email: user.email,
            password: user.password,
            role: user.role,
            refresh: None,
            created_at: Utc::now(),
        };
        tables.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_user_by_id(&self, user_id: UserId) -> Result<Option<StoredUser>> {
        self.gate().await?;
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<StoredUser>> {
        self.gate().await?;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_refresh_token(&self, token: &str) -> Result<Option<StoredUser>> {
        self.gate().await?;
        let tables = self.tables.read().await;

        // Every stored grant is compared so the scan time does not depend on where a match sits
        let mut found = None;
        for user in tables.users.values() {
            if let Some(grant) = &user.refresh {
                if constant_time_eq(&grant.token, token) {
                    found = Some(user.clone());
                }
            }
        }
        Ok(found)
    }

    async fn update_user_refresh_token(&self, user_id: UserId, grant: Option<RefreshGrant>) -> Result<bool> {
        self.gate().await?;
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&user_id) {
            Some(user) => {
                user.refresh = grant;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_user_profile(
        &self,
        user_id: UserId,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<Option<StoredUser>> {
        self.gate().await?;
        let mut tables = self.tables.write().await;

        if let Some(ref new_email) = email {
            if tables.email_taken(new_email, Some(user_id)) {
                return Err(GalleryError::ConflictError("Email already exists".to_string()));
            }
        }

        let Some(user) = tables.users.get_mut(&user_id) else {
            return Ok(None);
        };
        if let Some(new_email) = email {
            user.email = new_email;
        }
        if let Some(new_password) = password {
            user.password = new_password;
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, user_id: UserId) -> Result<bool> {
        self.gate().await?;
        let mut tables = self.tables.write().await;

        if tables.users.remove(&user_id).is_none() {
            return Ok(false);
        }
        for photoshoot in tables.photoshoots.values_mut() {
            if photoshoot.owner_id == Some(user_id) {
                photoshoot.owner_id = None;
            }
            photoshoot.shared_with.remove(&user_id);
        }
        Ok(true)
    }

    async fn list_users(&self) -> Result<Vec<StoredUser>> {
        self.gate().await?;
        let tables = self.tables.read().await;
        let mut users: Vec<StoredUser> = tables.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }
}

#[async_trait]
impl PhotoshootStorage for MemoryStorageProvider {
    async fn create_photoshoot(&self, photoshoot: NewPhotoshoot) -> Result<StoredPhotoshoot> {
        self.gate().await?;
        let mut tables = self.tables.write().await;

        if tables.title_taken(&photoshoot.title, None) {
            return Err(GalleryError::ConflictError("Title already exists".to_string()));
        }

        let id = tables.allocate_id();
        let now = Utc::now();
        let stored = StoredPhotoshoot {
            id,
            title: photoshoot.title,
            description: photoshoot.description,
            date: photoshoot.date,
            owner_id: photoshoot.owner_id,
            public: photoshoot.public,
            shared_with: photoshoot.shared_with,
            created_at: now,
            updated_at: now,
        };
        tables.photoshoots.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_photoshoot_by_id(&self, id: PhotoshootId) -> Result<Option<StoredPhotoshoot>> {
        self.gate().await?;
        Ok(self.tables.read().await.photoshoots.get(&id).cloned())
    }

    async fn list_photoshoots(&self) -> Result<Vec<StoredPhotoshoot>> {
        self.gate().await?;
        let tables = self.tables.read().await;
        let mut photoshoots: Vec<StoredPhotoshoot> = tables.photoshoots.values().cloned().collect();
        photoshoots.sort_by_key(|p| p.id);
        Ok(photoshoots)
    }

    async fn update_photoshoot(&self, mut photoshoot: StoredPhotoshoot) -> Result<bool> {
        self.gate().await?;
        let mut tables = self.tables.write().await;

        if !tables.photoshoots.contains_key(&photoshoot.id) {
            return Ok(false);
        }
        if tables.title_taken(&photoshoot.title, Some(photoshoot.id)) {
            return Err(GalleryError::ConflictError("Title already exists".to_string()));
        }

        photoshoot.updated_at = Utc::now();
        tables.photoshoots.insert(photoshoot.id, photoshoot);
        Ok(true)
    }

    async fn delete_photoshoot(&self, id: PhotoshootId) -> Result<bool> {
        self.gate().await?;
        let mut tables = self.tables.write().await;

        if tables.photoshoots.remove(&id).is_none() {
            return Ok(false);
        }
        let photo_ids: Vec<PhotoId> = tables
            .photos
            .values()
            .filter(|p| p.photoshoot_id == id)
            .map(|p| p.id)
            .collect();
        for photo_id in photo_ids {
            tables.remove_photo_cascade(photo_id);
        }
        Ok(true)
    }
}

#[async_trait]
impl PhotoStorage for MemoryStorageProvider {
    async fn create_photo(&self, photo: NewPhoto) -> Result<StoredPhoto> {
        self.gate().await?;
        let mut tables = self.tables.write().await;

        if !tables.photoshoots.contains_key(&photo.photoshoot_id) {
            return Err(GalleryError::NotFound);
        }

        let id = tables.allocate_id();
        let stored = StoredPhoto {
            id,
            photoshoot_id: photo.photoshoot_id,
            filename: photo.filename,
            caption: photo.caption,
            created_at: Utc::now(),
        };
        tables.photos.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_photo_by_id(&self, id: PhotoId) -> Result<Option<StoredPhoto>> {
        self.gate().await?;
        Ok(self.tables.read().await.photos.get(&id).cloned())
    }

    async fn list_photos(&self, photoshoot_id: PhotoshootId) -> Result<Vec<StoredPhoto>> {
        self.gate().await?;
        let tables = self.tables.read().await;
        let mut photos: Vec<StoredPhoto> = tables
            .photos
            .values()
            .filter(|p| p.photoshoot_id == photoshoot_id)
            .cloned()
            .collect();
        photos.sort_by_key(|p| p.id);
        Ok(photos)
    }

    async fn update_photo(&self, photo: StoredPhoto) -> Result<bool> {
        self.gate().await?;
        let mut tables = self.tables.write().await;
        match tables.photos.get_mut(&photo.id) {
            Some(existing) => {
                *existing = photo;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_photo(&self, id: PhotoId) -> Result<bool> {
        self.gate().await?;
        Ok(self.tables.write().await.remove_photo_cascade(id))
    }
}

#[async_trait]
impl CommentStorage for MemoryStorageProvider {
    async fn create_comment(&self, comment: NewComment) -> Result<StoredComment> {
        self.gate().await?;
        let mut tables = self.tables.write().await;

        if !tables.photos.contains_key(&comment.photo_id) {
            return Err(GalleryError::NotFound);
        }

        let id = tables.allocate_id();
        let now = Utc::now();
        let stored = StoredComment {
            id,
            photo_id: comment.photo_id,
            author_id: comment.author_id,
            body: comment.body,
            created_at: now,
            updated_at: now,
        };
        tables.comments.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_comment_by_id(&self, id: CommentId) -> Result<Option<StoredComment>> {
        self.gate().await?;
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn list_comments(&self, photo_id: PhotoId) -> Result<Vec<StoredComment>> {
        self.gate().await?;
        let tables = self.tables.read().await;
        let mut comments: Vec<StoredComment> = tables
            .comments
            .values()
            .filter(|c| c.photo_id == photo_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| (c.created_at, c.id));
        Ok(comments)
    }

    async fn update_comment(&self, mut comment: StoredComment) -> Result<bool> {
        self.gate().await?;
        let mut tables = self.tables.write().await;
        match tables.comments.get_mut(&comment.id) {
            Some(existing) => {
                comment.updated_at = Utc::now();
                *existing = comment;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_comment(&self, id: CommentId) -> Result<bool> {
        self.gate().await?;
        Ok(self.tables.write().await.comments.remove(&id).is_some())
    }
}

/// Create a new shared in-memory storage provider
pub fn create_memory_storage() -> Arc<MemoryStorageProvider> {
    Arc::new(MemoryStorageProvider::new())
}
