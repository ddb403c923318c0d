//! Demo data for development mode

use std::collections::BTreeSet;

use super::traits::*;
use crate::auth::user::Role;
use crate::error::Result;

/// Seeded accounts keep plaintext passwords, which the credential verifier accepts
pub const DEMO_ACCOUNTS: &[(&str, &str, Role)] = &[
    ("admin@example.com", "admin123", Role::Admin),
    ("user@example.com", "user123", Role::User),
];

/// Two accounts plus one public, ownerless photoshoot with a couple of photos
pub async fn seed_demo_data(storage: &dyn StorageProvider) -> Result<()> {
    let mut admin_id = None;
    for (email, password, role) in DEMO_ACCOUNTS {
        let user = storage
            .user_storage()
            .create_user(NewUser {
                email: email.to_string(),
                password: password.to_string(),
                role: *role,
            })
            .await?;
        if role.is_admin() {
            admin_id = Some(user.id);
        }
        log::info!("Seeded {} account {}", role, email);
    }

    let photoshoot = storage
        .photoshoot_storage()
        .create_photoshoot(NewPhotoshoot {
            title: "Sunset Beach Session".to_string(),
            description: Some("A relaxed sunset photoshoot on the beach".to_string()),
            date: Some(chrono::Utc::now()),
            owner_id: None,
            public: true,
            shared_with: BTreeSet::new(),
        })
        .await?;

    let mut first_photo = None;
    for (filename, caption) in [
        ("sunset-1.jpg", "Golden hour over the waves"),
        ("sunset-2.jpg", "Silhouette on the sand"),
    ] {
        let photo = storage
            .photo_storage()
            .create_photo(NewPhoto {
                photoshoot_id: photoshoot.id,
                filename: filename.to_string(),
                caption: Some(caption.to_string()),
            })
            .await?;
        first_photo.get_or_insert(photo.id);
    }

    if let (Some(photo_id), Some(author_id)) = (first_photo, admin_id) {
        storage
            .comment_storage()
            .create_comment(NewComment {
                photo_id,
                author_id,
                body: "Lovely colors!".to_string(),
            })
            .await?;
    }

    log::info!("Seeded demo photoshoot {}", photoshoot.id);
    Ok(())
}
