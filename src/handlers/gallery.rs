//! User, photoshoot, photo and comment operations
//!
//! Each operation resolves its permission through the authorization engine
//! before touching the repository for anything beyond the lookups the engine
//! already made.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::auth::credentials::hash_password;
use crate::auth::user::{Principal, UserId};
use crate::authz::{Action, AuthorizationEngine, Relation, ADMIN_ONLY, ANY_ROLE};
use crate::config::RepositoryPolicy;
use crate::error::{GalleryError, Result};
use crate::handlers::auth::{validate_email, validate_password, UserView};
use crate::storage::{
    guard, CommentId, NewComment, NewPhoto, NewPhotoshoot, PhotoId, PhotoshootId, SharedStorage, StoredComment,
    StoredPhoto, StoredPhotoshoot,
};

const MAX_TITLE_LENGTH: usize = 50;
const MAX_FILENAME_LENGTH: usize = 100;
const MIN_COMMENT_LENGTH: usize = 2;
const MAX_COMMENT_LENGTH: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePhotoshootRequest {
    pub title: String,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    /// Admins may create on behalf of another user
    pub owner_id: Option<UserId>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub shared_with: BTreeSet<UserId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePhotoshootRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub owner_id: Option<UserId>,
    pub public: Option<bool>,
    pub shared_with: Option<BTreeSet<UserId>>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePhotoRequest {
    pub filename: String,
    pub caption: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePhotoRequest {
    pub filename: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

/// Photoshoot as returned to a caller. The shared-with list is only shown to
/// callers who may change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoshootView {
    pub id: PhotoshootId,
    pub title: String,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub owner_id: Option<UserId>,
    pub public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_with: Option<BTreeSet<UserId>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PhotoshootView {
    fn present(principal: &Principal, photoshoot: StoredPhotoshoot) -> Self {
        let can_manage = Relation::between(principal, &photoshoot).can_update();
        Self {
            id: photoshoot.id,
            title: photoshoot.title,
            description: photoshoot.description,
            date: photoshoot.date,
            owner_id: photoshoot.owner_id,
            public: photoshoot.public,
            shared_with: can_manage.then_some(photoshoot.shared_with),
            created_at: photoshoot.created_at,
            updated_at: photoshoot.updated_at,
        }
    }
}

fn validate_length(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let length = value.chars().count();
    if length < min || length > max {
        return Err(GalleryError::ValidationError(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<()> {
    validate_length("title", title, 1, MAX_TITLE_LENGTH)
}

fn validate_filename(filename: &str) -> Result<()> {
    validate_length("filename", filename, 1, MAX_FILENAME_LENGTH)
}

fn normalize_comment(body: &str) -> Result<String> {
    let body = body.trim();
    validate_length("body", body, MIN_COMMENT_LENGTH, MAX_COMMENT_LENGTH)?;
    Ok(body.to_string())
}

/// A mutation that reports `false` lost a race with a delete
fn found(updated: bool) -> Result<()> {
    if updated {
        Ok(())
    } else {
        Err(GalleryError::NotFound)
    }
}

pub struct GalleryService {
    storage: SharedStorage,
    engine: AuthorizationEngine,
    policy: RepositoryPolicy,
}

impl GalleryService {
    pub fn new(storage: SharedStorage, policy: RepositoryPolicy) -> Self {
        Self {
            engine: AuthorizationEngine::new(storage.clone(), policy),
            storage,
            policy,
        }
    }

    // Users

    pub async fn list_users(&self, principal: &Principal) -> Result<Vec<UserView>> {
        self.engine.role_gate(principal, ADMIN_ONLY, "list_users").await?;

        let users = self.storage.user_storage();
        let all = guard::read(self.policy, "list_users", move || users.list_users()).await?;
        Ok(all.iter().map(UserView::from).collect())
    }

    pub async fn get_user(&self, principal: &Principal, user_id: UserId) -> Result<UserView> {
        self.engine.role_gate(principal, ANY_ROLE, "get_user").await?;
        self.engine.authorize_user(principal, user_id, Action::Read).await?;

        let users = self.storage.user_storage();
        guard::read(self.policy, "find_user_by_id", move || users.find_user_by_id(user_id))
            .await?
            .map(|user| UserView::from(&user))
            .ok_or(GalleryError::NotFound)
    }

    pub async fn update_user(
        &self,
        principal: &Principal,
        user_id: UserId,
        request: UpdateUserRequest,
    ) -> Result<UserView> {
        self.engine.role_gate(principal, ANY_ROLE, "update_user").await?;
        self.engine.authorize_user(principal, user_id, Action::Update).await?;

        let email = request.email.as_deref().map(validate_email).transpose()?;
        let password = match request.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let users = self.storage.user_storage();
        guard::write(self.policy, "update_user_profile", users.update_user_profile(user_id, email, password))
            .await?
            .map(|user| UserView::from(&user))
            .ok_or(GalleryError::NotFound)
    }

    pub async fn delete_user(&self, principal: &Principal, user_id: UserId) -> Result<()> {
        self.engine.role_gate(principal, ADMIN_ONLY, "delete_user").await?;
        self.engine.authorize_user(principal, user_id, Action::Delete).await?;

        let users = self.storage.user_storage();
        found(guard::write(self.policy, "delete_user", users.delete_user(user_id)).await?)
    }

    // Photoshoots

    pub async fn list_photoshoots(&self, principal: &Principal) -> Result<Vec<PhotoshootView>> {
        self.engine.role_gate(principal, ANY_ROLE, "list_photoshoots").await?;

        let photoshoots = self.storage.photoshoot_storage();
        let all = guard::read(self.policy, "list_photoshoots", move || photoshoots.list_photoshoots()).await?;
        Ok(self
            .engine
            .visible_photoshoots(principal, all)
            .into_iter()
            .map(|p| PhotoshootView::present(principal, p))
            .collect())
    }

    pub async fn create_photoshoot(
        &self,
        principal: &Principal,
        request: CreatePhotoshootRequest,
    ) -> Result<PhotoshootView> {
        self.engine.role_gate(principal, ANY_ROLE, "create_photoshoot").await?;
        validate_title(&request.title)?;

        let owner_id = request.owner_id.unwrap_or(principal.id);
        if owner_id != principal.id {
            self.engine.role_gate(principal, ADMIN_ONLY, "create_photoshoot_for_other").await?;
            self.ensure_user_exists(owner_id).await?;
        }

        let photoshoots = self.storage.photoshoot_storage();
        let created = guard::write(
            self.policy,
            "create_photoshoot",
            photoshoots.create_photoshoot(NewPhotoshoot {
                title: request.title,
                description: request.description,
                date: request.date,
                owner_id: Some(owner_id),
                public: request.public,
                shared_with: request.shared_with,
            }),
        )
        .await?;

        log::info!("User {} created photoshoot {}", principal.id, created.id);
        Ok(PhotoshootView::present(principal, created))
    }

    pub async fn get_photoshoot(&self, principal: &Principal, photoshoot_id: PhotoshootId) -> Result<PhotoshootView> {
        self.engine.role_gate(principal, ANY_ROLE, "get_photoshoot").await?;
        let photoshoot = self
            .engine
            .authorize_photoshoot(principal, photoshoot_id, Action::Read)
            .await?;
        Ok(PhotoshootView::present(principal, photoshoot))
    }

    pub async fn update_photoshoot(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        request: UpdatePhotoshootRequest,
    ) -> Result<PhotoshootView> {
        self.engine.role_gate(principal, ANY_ROLE, "update_photoshoot").await?;
        let mut photoshoot = self
            .engine
            .authorize_photoshoot(principal, photoshoot_id, Action::Update)
            .await?;

        if let Some(owner_id) = request.owner_id {
            if photoshoot.owner_id != Some(owner_id) {
                self.engine.role_gate(principal, ADMIN_ONLY, "reassign_photoshoot_owner").await?;
                self.ensure_user_exists(owner_id).await?;
                photoshoot.owner_id = Some(owner_id);
            }
        }
        if let Some(title) = request.title {
            validate_title(&title)?;
            photoshoot.title = title;
        }
        if let Some(description) = request.description {
            photoshoot.description = Some(description);
        }
        if let Some(date) = request.date {
            photoshoot.date = Some(date);
        }
        if let Some(public) = request.public {
            photoshoot.public = public;
        }
        if let Some(shared_with) = request.shared_with {
            photoshoot.shared_with = shared_with;
        }

        let photoshoots = self.storage.photoshoot_storage();
        found(guard::write(self.policy, "update_photoshoot", photoshoots.update_photoshoot(photoshoot.clone())).await?)?;

        let refreshed = guard::read(self.policy, "find_photoshoot_by_id", move || {
            photoshoots.find_photoshoot_by_id(photoshoot_id)
        })
        .await?
        .unwrap_or(photoshoot);
        Ok(PhotoshootView::present(principal, refreshed))
    }

    pub async fn delete_photoshoot(&self, principal: &Principal, photoshoot_id: PhotoshootId) -> Result<()> {
        self.engine.role_gate(principal, ANY_ROLE, "delete_photoshoot").await?;
        self.engine
            .authorize_photoshoot(principal, photoshoot_id, Action::Delete)
            .await?;

        let photoshoots = self.storage.photoshoot_storage();
        found(guard::write(self.policy, "delete_photoshoot", photoshoots.delete_photoshoot(photoshoot_id)).await?)
    }

    // Photos

    pub async fn list_photos(&self, principal: &Principal, photoshoot_id: PhotoshootId) -> Result<Vec<StoredPhoto>> {
        self.engine.role_gate(principal, ANY_ROLE, "list_photos").await?;
        self.engine
            .authorize_photo_collection(principal, photoshoot_id, Action::Read)
            .await?;

        let photos = self.storage.photo_storage();
        guard::read(self.policy, "list_photos", move || photos.list_photos(photoshoot_id)).await
    }

    pub async fn create_photo(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        request: CreatePhotoRequest,
    ) -> Result<StoredPhoto> {
        self.engine.role_gate(principal, ANY_ROLE, "create_photo").await?;
        self.engine
            .authorize_photo_collection(principal, photoshoot_id, Action::Update)
            .await?;
        validate_filename(&request.filename)?;

        let photos = self.storage.photo_storage();
        guard::write(
            self.policy,
            "create_photo",
            photos.create_photo(NewPhoto {
                photoshoot_id,
                filename: request.filename,
                caption: request.caption,
            }),
        )
        .await
    }

    pub async fn get_photo(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        photo_id: PhotoId,
    ) -> Result<StoredPhoto> {
        self.engine.role_gate(principal, ANY_ROLE, "get_photo").await?;
        let (_, photo) = self
            .engine
            .authorize_photo(principal, photoshoot_id, photo_id, Action::Read)
            .await?;
        Ok(photo)
    }

    pub async fn update_photo(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        photo_id: PhotoId,
        request: UpdatePhotoRequest,
    ) -> Result<StoredPhoto> {
        self.engine.role_gate(principal, ANY_ROLE, "update_photo").await?;
        let (_, mut photo) = self
            .engine
            .authorize_photo(principal, photoshoot_id, photo_id, Action::Update)
            .await?;

        if let Some(filename) = request.filename {
            validate_filename(&filename)?;
            photo.filename = filename;
        }
        if let Some(caption) = request.caption {
            photo.caption = Some(caption);
        }

        let photos = self.storage.photo_storage();
        found(guard::write(self.policy, "update_photo", photos.update_photo(photo.clone())).await?)?;
        Ok(photo)
    }

    pub async fn delete_photo(&self, principal: &Principal, photoshoot_id: PhotoshootId, photo_id: PhotoId) -> Result<()> {
        self.engine.role_gate(principal, ANY_ROLE, "delete_photo").await?;
        self.engine
            .authorize_photo(principal, photoshoot_id, photo_id, Action::Delete)
            .await?;

        let photos = self.storage.photo_storage();
        found(guard::write(self.policy, "delete_photo", photos.delete_photo(photo_id)).await?)
    }

    // Comments

    pub async fn list_comments(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        photo_id: PhotoId,
    ) -> Result<Vec<StoredComment>> {
        self.engine.role_gate(principal, ANY_ROLE, "list_comments").await?;
        self.engine
            .authorize_comment_collection(principal, photoshoot_id, photo_id)
            .await?;

        let comments = self.storage.comment_storage();
        guard::read(self.policy, "list_comments", move || comments.list_comments(photo_id)).await
    }

    /// Anyone who can see the photo may comment on it
    pub async fn create_comment(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        photo_id: PhotoId,
        request: CommentRequest,
    ) -> Result<StoredComment> {
        self.engine.role_gate(principal, ANY_ROLE, "create_comment").await?;
        self.engine
            .authorize_comment_collection(principal, photoshoot_id, photo_id)
            .await?;
        let body = normalize_comment(&request.body)?;

        let comments = self.storage.comment_storage();
        guard::write(
            self.policy,
            "create_comment",
            comments.create_comment(NewComment {
                photo_id,
                author_id: principal.id,
                body,
            }),
        )
        .await
    }

    pub async fn get_comment(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        photo_id: PhotoId,
        comment_id: CommentId,
    ) -> Result<StoredComment> {
        self.engine.role_gate(principal, ANY_ROLE, "get_comment").await?;
        self.engine
            .authorize_comment(principal, photoshoot_id, photo_id, comment_id, Action::Read)
            .await
    }

    pub async fn update_comment(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        photo_id: PhotoId,
        comment_id: CommentId,
        request: CommentRequest,
    ) -> Result<StoredComment> {
        self.engine.role_gate(principal, ANY_ROLE, "update_comment").await?;
        let mut comment = self
            .engine
            .authorize_comment(principal, photoshoot_id, photo_id, comment_id, Action::Update)
            .await?;
        comment.body = normalize_comment(&request.body)?;

        let comments = self.storage.comment_storage();
        found(guard::write(self.policy, "update_comment", comments.update_comment(comment)).await?)?;

        guard::read(self.policy, "find_comment_by_id", move || comments.find_comment_by_id(comment_id))
            .await?
            .ok_or(GalleryError::NotFound)
    }

    pub async fn delete_comment(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        photo_id: PhotoId,
        comment_id: CommentId,
    ) -> Result<()> {
        self.engine.role_gate(principal, ANY_ROLE, "delete_comment").await?;
        self.engine
            .authorize_comment(principal, photoshoot_id, photo_id, comment_id, Action::Delete)
            .await?;

        let comments = self.storage.comment_storage();
        found(guard::write(self.policy, "delete_comment", comments.delete_comment(comment_id)).await?)
    }

    async fn ensure_user_exists(&self, user_id: UserId) -> Result<()> {
        let users = self.storage.user_storage();
        match guard::read(self.policy, "find_user_by_id", move || users.find_user_by_id(user_id)).await? {
            Some(_) => Ok(()),
            None => Err(GalleryError::ValidationError(format!("Owner {} does not exist", user_id))),
        }
    }
}
