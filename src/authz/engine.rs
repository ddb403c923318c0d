//! Layered authorization: role gate first, then the resource gate.
//!
//! Callers without read access to a photoshoot get `NotFound` for it and for
//! everything beneath it. `Forbidden` is only returned once read access is
//! established and the specific mutation is denied. The engine reads, never
//! writes.

use crate::auth::user::{Principal, Role, UserId};
use crate::authz::policy::{can_delete_comment, can_edit_comment, Action, Relation};
use crate::config::RepositoryPolicy;
use crate::error::{Denial, GalleryError, Result};
use crate::security_logger::{log_security_event, SecurityEvent};
use crate::storage::{
    guard, CommentId, PhotoId, PhotoshootId, SharedStorage, StoredComment, StoredPhoto, StoredPhotoshoot,
};

pub struct AuthorizationEngine {
    storage: SharedStorage,
    policy: RepositoryPolicy,
}

impl AuthorizationEngine {
    pub fn new(storage: SharedStorage, policy: RepositoryPolicy) -> Self {
        Self { storage, policy }
    }

    /// Coarse check: is the caller's role allowed for this operation at all
    pub async fn role_gate(&self, principal: &Principal, allowed: &[Role], operation: &str) -> Result<()> {
        if principal.has_any_role(allowed) {
            Ok(())
        } else {
            Err(self
                .deny(principal, Denial::Forbidden, operation, format!("role:{}", principal.role))
                .await)
        }
    }

    /// Fetch a photoshoot and check `action` on it
    pub async fn authorize_photoshoot(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        action: Action,
    ) -> Result<StoredPhotoshoot> {
        let resource = format!("photoshoot:{}", photoshoot_id);
        let (photoshoot, relation) = self.readable_photoshoot(principal, photoshoot_id, action).await?;

        if !relation.permits(action) {
            return Err(self.deny(principal, Denial::Forbidden, action.as_str(), resource).await);
        }
        Ok(photoshoot)
    }

    /// Listing photos needs parent read; adding one needs parent update
    pub async fn authorize_photo_collection(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        action: Action,
    ) -> Result<StoredPhotoshoot> {
        self.authorize_photoshoot(principal, photoshoot_id, action).await
    }

    /// Resolve a photo under its photoshoot and check `action` against the parent
    pub async fn authorize_photo(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        photo_id: PhotoId,
        action: Action,
    ) -> Result<(StoredPhotoshoot, StoredPhoto)> {
        let (photoshoot, relation) = self.readable_photoshoot(principal, photoshoot_id, action).await?;
        let photo = self.photo_in(principal, &photoshoot, photo_id, action).await?;

        if !relation.permits(action) {
            let resource = format!("photo:{}", photo_id);
            return Err(self.deny(principal, Denial::Forbidden, action.as_str(), resource).await);
        }
        Ok((photoshoot, photo))
    }

    /// Listing and creating comments need read access to the photo's photoshoot
    pub async fn authorize_comment_collection(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        photo_id: PhotoId,
    ) -> Result<StoredPhoto> {
        let (_, photo) = self
            .authorize_photo(principal, photoshoot_id, photo_id, Action::Read)
            .await?;
        Ok(photo)
    }

    /// Read follows the parent; update is author-only; delete is author or admin
    pub async fn authorize_comment(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        photo_id: PhotoId,
        comment_id: CommentId,
        action: Action,
    ) -> Result<StoredComment> {
        let (_, photo) = self
            .authorize_photo(principal, photoshoot_id, photo_id, Action::Read)
            .await?;

        let resource = format!("comment:{}", comment_id);
        let comments = self.storage.comment_storage();
        let comment = guard::read(self.policy, "find_comment_by_id", move || {
            comments.find_comment_by_id(comment_id)
        })
        .await?;

        let comment = match comment {
            Some(comment) if comment.photo_id == photo.id => comment,
            _ => return Err(self.deny(principal, Denial::NotFound, action.as_str(), resource).await),
        };

        let allowed = match action {
            Action::Read => true,
            Action::Update => can_edit_comment(principal, &comment),
            Action::Delete => can_delete_comment(principal, &comment),
        };
        if !allowed {
            return Err(self.deny(principal, Denial::Forbidden, action.as_str(), resource).await);
        }
        Ok(comment)
    }

    /// User records: anyone but the subject or an admin is told it does not
    /// exist. Profile edits are self-only; deletion is admin-only.
    pub async fn authorize_user(&self, principal: &Principal, target: UserId, action: Action) -> Result<()> {
        let resource = format!("user:{}", target);
        let is_self = principal.id == target;

        if !is_self && !principal.is_admin() {
            return Err(self.deny(principal, Denial::NotFound, action.as_str(), resource).await);
        }

        let allowed = match action {
            Action::Read => true,
            Action::Update => is_self,
            Action::Delete => principal.is_admin(),
        };
        if !allowed {
            return Err(self.deny(principal, Denial::Forbidden, action.as_str(), resource).await);
        }
        Ok(())
    }

    /// Keep only the photoshoots the caller may read
    pub fn visible_photoshoots(&self, principal: &Principal, photoshoots: Vec<StoredPhotoshoot>) -> Vec<StoredPhotoshoot> {
        photoshoots
            .into_iter()
            .filter(|p| Relation::between(principal, p).can_read())
            .collect()
    }

    async fn readable_photoshoot(
        &self,
        principal: &Principal,
        photoshoot_id: PhotoshootId,
        action: Action,
    ) -> Result<(StoredPhotoshoot, Relation)> {
        let photoshoots = self.storage.photoshoot_storage();
        let found = guard::read(self.policy, "find_photoshoot_by_id", move || {
            photoshoots.find_photoshoot_by_id(photoshoot_id)
        })
        .await?;

        if let Some(photoshoot) = found {
            let relation = Relation::between(principal, &photoshoot);
            if relation.can_read() {
                return Ok((photoshoot, relation));
            }
        }

        let resource = format!("photoshoot:{}", photoshoot_id);
        Err(self.deny(principal, Denial::NotFound, action.as_str(), resource).await)
    }

    async fn photo_in(
        &self,
        principal: &Principal,
        photoshoot: &StoredPhotoshoot,
        photo_id: PhotoId,
        action: Action,
    ) -> Result<StoredPhoto> {
        let photos = self.storage.photo_storage();
        let found = guard::read(self.policy, "find_photo_by_id", move || photos.find_photo_by_id(photo_id)).await?;

        match found {
            Some(photo) if photo.photoshoot_id == photoshoot.id => Ok(photo),
            _ => {
                let resource = format!("photo:{}", photo_id);
                Err(self.deny(principal, Denial::NotFound, action.as_str(), resource).await)
            }
        }
    }

    async fn deny(&self, principal: &Principal, denial: Denial, action: &str, resource: String) -> GalleryError {
        if let Some(event) = SecurityEvent::for_denial(denial, principal.id, action, resource) {
            log_security_event(event).await;
        }
        match denial {
            Denial::Unauthenticated => GalleryError::Unauthenticated,
            Denial::Forbidden => GalleryError::Forbidden,
            Denial::NotFound => GalleryError::NotFound,
        }
    }
}
