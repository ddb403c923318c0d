use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use rusty_gallery::auth::{Principal, Role};
use rusty_gallery::config::RepositoryPolicy;
use rusty_gallery::handlers::gallery::{
    CommentRequest, CreatePhotoRequest, CreatePhotoshootRequest, UpdatePhotoRequest, UpdatePhotoshootRequest,
    UpdateUserRequest,
};
use rusty_gallery::handlers::GalleryService;
use rusty_gallery::storage::{create_memory_storage, MemoryStorageProvider, NewUser, StorageProvider};
use rusty_gallery::GalleryError;

struct Gallery {
    service: GalleryService,
    storage: Arc<MemoryStorageProvider>,
    owner: Principal,
    friend: Principal,
    stranger: Principal,
    admin: Principal,
}

async fn add_user(storage: &MemoryStorageProvider, email: &str, role: Role) -> Principal {
    let user = storage
        .user_storage()
        .create_user(NewUser {
            email: email.to_string(),
            password: "pw123456".to_string(),
            role,
        })
        .await
        .unwrap();
    Principal::new(user.id, role)
}

async fn setup() -> Gallery {
    let storage = create_memory_storage();
    let owner = add_user(&storage, "owner@example.com", Role::User).await;
    let friend = add_user(&storage, "friend@example.com", Role::User).await;
    let stranger = add_user(&storage, "stranger@example.com", Role::User).await;
    let admin = add_user(&storage, "admin@example.com", Role::Admin).await;

    Gallery {
        service: GalleryService::new(storage.clone(), RepositoryPolicy::default()),
        storage,
        owner,
        friend,
        stranger,
        admin,
    }
}

fn private_shoot(title: &str, shared_with: &[Principal]) -> CreatePhotoshootRequest {
    CreatePhotoshootRequest {
        title: title.to_string(),
        description: None,
        date: None,
        owner_id: None,
        public: false,
        shared_with: shared_with.iter().map(|p| p.id).collect(),
    }
}

fn photo(filename: &str) -> CreatePhotoRequest {
    CreatePhotoRequest {
        filename: filename.to_string(),
        caption: None,
    }
}

fn comment(body: &str) -> CommentRequest {
    CommentRequest { body: body.to_string() }
}

#[tokio::test]
async fn test_private_photoshoot_is_not_found_for_stranger() {
    let g = setup().await;
    let shoot = g
        .service
        .create_photoshoot(&g.owner, private_shoot("Studio", &[]))
        .await
        .unwrap();
    let picture = g.service.create_photo(&g.owner, shoot.id, photo("a.jpg")).await.unwrap();

    assert_eq!(
        g.service.get_photoshoot(&g.stranger, shoot.id).await.unwrap_err(),
        GalleryError::NotFound
    );
    // Same answer as a photoshoot that never existed
    assert_eq!(
        g.service.get_photoshoot(&g.stranger, 9999).await.unwrap_err(),
        GalleryError::NotFound
    );
    assert_eq!(
        g.service.get_photo(&g.stranger, shoot.id, picture.id).await.unwrap_err(),
        GalleryError::NotFound
    );
    assert_eq!(
        g.service.list_comments(&g.stranger, shoot.id, picture.id).await.unwrap_err(),
        GalleryError::NotFound
    );
    assert_eq!(
        g.service.delete_photoshoot(&g.stranger, shoot.id).await.unwrap_err(),
        GalleryError::NotFound
    );

    let visible = g.service.list_photoshoots(&g.stranger).await.unwrap();
    assert!(visible.iter().all(|s| s.id != shoot.id));
}

#[tokio::test]
async fn test_shared_user_can_read_but_not_change() {
    let g = setup().await;
    let shoot = g
        .service
        .create_photoshoot(&g.owner, private_shoot("Family", &[g.friend]))
        .await
        .unwrap();
    let picture = g.service.create_photo(&g.owner, shoot.id, photo("b.jpg")).await.unwrap();

    let seen = g.service.get_photoshoot(&g.friend, shoot.id).await.unwrap();
    assert_eq!(seen.title, "Family");
    // Only callers who may change the share list get to see it
    assert!(seen.shared_with.is_none());
    assert!(g
        .service
        .get_photoshoot(&g.owner, shoot.id)
        .await
        .unwrap()
        .shared_with
        .is_some());

    let rename = UpdatePhotoshootRequest {
        title: Some("Mine now".to_string()),
        ..Default::default()
    };
    assert_eq!(
        g.service.update_photoshoot(&g.friend, shoot.id, rename).await.unwrap_err(),
        GalleryError::Forbidden
    );
    assert_eq!(
        g.service.delete_photoshoot(&g.friend, shoot.id).await.unwrap_err(),
        GalleryError::Forbidden
    );
    assert_eq!(
        g.service.create_photo(&g.friend, shoot.id, photo("c.jpg")).await.unwrap_err(),
        GalleryError::Forbidden
    );
    assert_eq!(
        g.service
            .update_photo(&g.friend, shoot.id, picture.id, UpdatePhotoRequest::default())
            .await
            .unwrap_err(),
        GalleryError::Forbidden
    );

    // Shared users may still take part in the discussion
    let note = g
        .service
        .create_comment(&g.friend, shoot.id, picture.id, comment("  Great light  "))
        .await
        .unwrap();
    assert_eq!(note.body, "Great light");
    assert_eq!(note.author_id, g.friend.id);
}

#[tokio::test]
async fn test_comment_edit_and_delete_rules() {
    let g = setup().await;
    let shoot = g
        .service
        .create_photoshoot(&g.owner, private_shoot("Wedding", &[g.friend]))
        .await
        .unwrap();
    let picture = g.service.create_photo(&g.owner, shoot.id, photo("d.jpg")).await.unwrap();
    let note = g
        .service
        .create_comment(&g.friend, shoot.id, picture.id, comment("First!"))
        .await
        .unwrap();

    let edited = g
        .service
        .update_comment(&g.friend, shoot.id, picture.id, note.id, comment("Second thoughts"))
        .await
        .unwrap();
    assert_eq!(edited.body, "Second thoughts");

    // Nobody edits someone else's words, not even an admin or the photoshoot owner
    for other in [g.admin, g.owner] {
        assert_eq!(
            g.service
                .update_comment(&other, shoot.id, picture.id, note.id, comment("Rewritten"))
                .await
                .unwrap_err(),
            GalleryError::Forbidden
        );
    }
    assert_eq!(
        g.service
            .delete_comment(&g.owner, shoot.id, picture.id, note.id)
            .await
            .unwrap_err(),
        GalleryError::Forbidden
    );

    g.service
        .delete_comment(&g.admin, shoot.id, picture.id, note.id)
        .await
        .unwrap();
    assert_eq!(
        g.service
            .get_comment(&g.friend, shoot.id, picture.id, note.id)
            .await
            .unwrap_err(),
        GalleryError::NotFound
    );
}

#[tokio::test]
async fn test_comment_body_is_validated() {
    let g = setup().await;
    let shoot = g
        .service
        .create_photoshoot(&g.owner, private_shoot("Portraits", &[]))
        .await
        .unwrap();
    let picture = g.service.create_photo(&g.owner, shoot.id, photo("e.jpg")).await.unwrap();

    for body in ["", " x ", "y".repeat(501).as_str()] {
        let result = g
            .service
            .create_comment(&g.owner, shoot.id, picture.id, comment(body))
            .await;
        assert!(matches!(result, Err(GalleryError::ValidationError(_))));
    }
}

#[tokio::test]
async fn test_photo_addressed_through_wrong_photoshoot() {
    let g = setup().await;
    let first = g
        .service
        .create_photoshoot(&g.owner, private_shoot("First", &[]))
        .await
        .unwrap();
    let second = g
        .service
        .create_photoshoot(&g.owner, private_shoot("Second", &[]))
        .await
        .unwrap();
    let picture = g.service.create_photo(&g.owner, first.id, photo("f.jpg")).await.unwrap();

    assert_eq!(
        g.service.get_photo(&g.owner, second.id, picture.id).await.unwrap_err(),
        GalleryError::NotFound
    );
    assert!(g.service.get_photo(&g.owner, first.id, picture.id).await.is_ok());
}

#[tokio::test]
async fn test_admin_manages_any_photoshoot() {
    let g = setup().await;
    let shoot = g
        .service
        .create_photoshoot(&g.owner, private_shoot("Private", &[]))
        .await
        .unwrap();

    let reassigned = g
        .service
        .update_photoshoot(
            &g.admin,
            shoot.id,
            UpdatePhotoshootRequest {
                owner_id: Some(g.stranger.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(reassigned.owner_id, Some(g.stranger.id));

    // The previous owner lost access along with ownership
    assert_eq!(
        g.service.get_photoshoot(&g.owner, shoot.id).await.unwrap_err(),
        GalleryError::NotFound
    );

    g.service.delete_photoshoot(&g.admin, shoot.id).await.unwrap();
    assert_eq!(
        g.service.get_photoshoot(&g.admin, shoot.id).await.unwrap_err(),
        GalleryError::NotFound
    );
}

#[tokio::test]
async fn test_only_admin_creates_for_others_or_reassigns() {
    let g = setup().await;
    let mut request = private_shoot("Gift", &[]);
    request.owner_id = Some(g.friend.id);
    assert_eq!(
        g.service.create_photoshoot(&g.owner, request).await.unwrap_err(),
        GalleryError::Forbidden
    );

    let mut request = private_shoot("Gift", &[]);
    request.owner_id = Some(g.friend.id);
    let created = g.service.create_photoshoot(&g.admin, request).await.unwrap();
    assert_eq!(created.owner_id, Some(g.friend.id));

    let steal = UpdatePhotoshootRequest {
        owner_id: Some(g.owner.id),
        ..Default::default()
    };
    assert_eq!(
        g.service.update_photoshoot(&g.friend, created.id, steal).await.unwrap_err(),
        GalleryError::Forbidden
    );

    let mut request = private_shoot("Ghost", &[]);
    request.owner_id = Some(4242);
    assert!(matches!(
        g.service.create_photoshoot(&g.admin, request).await,
        Err(GalleryError::ValidationError(_))
    ));
}

#[tokio::test]
async fn test_public_photoshoot_visible_to_everyone() {
    let g = setup().await;
    let mut request = private_shoot("Open day", &[]);
    request.public = true;
    let shoot = g.service.create_photoshoot(&g.owner, request).await.unwrap();

    let seen = g.service.get_photoshoot(&g.stranger, shoot.id).await.unwrap();
    assert!(seen.public);
    assert_eq!(
        g.service
            .update_photoshoot(&g.stranger, shoot.id, UpdatePhotoshootRequest::default())
            .await
            .unwrap_err(),
        GalleryError::Forbidden
    );
}

#[tokio::test]
async fn test_user_records() {
    let g = setup().await;

    assert_eq!(
        g.service.list_users(&g.owner).await.unwrap_err(),
        GalleryError::Forbidden
    );
    assert_eq!(g.service.list_users(&g.admin).await.unwrap().len(), 4);

    assert!(g.service.get_user(&g.owner, g.owner.id).await.is_ok());
    assert!(g.service.get_user(&g.admin, g.owner.id).await.is_ok());
    assert_eq!(
        g.service.get_user(&g.stranger, g.owner.id).await.unwrap_err(),
        GalleryError::NotFound
    );

    let update = UpdateUserRequest {
        email: Some("renamed@example.com".to_string()),
        password: None,
    };
    let updated = g.service.update_user(&g.owner, g.owner.id, update).await.unwrap();
    assert_eq!(updated.email, "renamed@example.com");

    let update = UpdateUserRequest {
        email: Some("admin-edit@example.com".to_string()),
        password: None,
    };
    assert_eq!(
        g.service.update_user(&g.admin, g.owner.id, update).await.unwrap_err(),
        GalleryError::Forbidden
    );

    assert_eq!(
        g.service.delete_user(&g.owner, g.stranger.id).await.unwrap_err(),
        GalleryError::Forbidden
    );
}

#[tokio::test]
async fn test_deleting_owner_orphans_photoshoots() {
    let g = setup().await;
    let shoot = g
        .service
        .create_photoshoot(&g.owner, private_shoot("Left behind", &[g.friend]))
        .await
        .unwrap();

    g.service.delete_user(&g.admin, g.owner.id).await.unwrap();

    let orphan = g.service.get_photoshoot(&g.admin, shoot.id).await.unwrap();
    assert_eq!(orphan.owner_id, None);
    // Without an owner the share list no longer grants access
    assert_eq!(
        g.service.get_photoshoot(&g.friend, shoot.id).await.unwrap_err(),
        GalleryError::NotFound
    );
}

#[tokio::test]
async fn test_outage_is_reported_as_unavailable() {
    let g = setup().await;
    let shoot = g
        .service
        .create_photoshoot(&g.owner, private_shoot("Offline", &[]))
        .await
        .unwrap();

    g.storage.set_available(false);
    assert!(matches!(
        g.service.get_photoshoot(&g.owner, shoot.id).await,
        Err(GalleryError::RepositoryUnavailable(_))
    ));

    g.storage.set_available(true);
    let shared: BTreeSet<_> = [g.friend.id].into_iter().collect();
    let updated = g
        .service
        .update_photoshoot(
            &g.owner,
            shoot.id,
            UpdatePhotoshootRequest {
                shared_with: Some(shared.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.shared_with, Some(shared));
}

#[tokio::test]
async fn test_slow_repository_times_out() {
    let g = setup().await;
    let shoot = g
        .service
        .create_photoshoot(&g.owner, private_shoot("Slow", &[]))
        .await
        .unwrap();

    let impatient = GalleryService::new(
        g.storage.clone(),
        RepositoryPolicy {
            timeout: Duration::from_millis(20),
            read_retries: 2,
        },
    );
    g.storage.set_latency(Duration::from_millis(200));

    assert_eq!(
        impatient.list_photoshoots(&g.owner).await.unwrap_err(),
        GalleryError::Timeout
    );
    // A slow lookup is never turned into a denial
    assert_eq!(
        impatient.get_photoshoot(&g.stranger, shoot.id).await.unwrap_err(),
        GalleryError::Timeout
    );
    assert_eq!(
        impatient
            .create_photoshoot(&g.owner, private_shoot("Never stored", &[]))
            .await
            .unwrap_err(),
        GalleryError::Timeout
    );

    g.storage.set_latency(Duration::ZERO);
    let titles: Vec<_> = impatient
        .list_photoshoots(&g.owner)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.title)
        .collect();
    assert_eq!(titles, vec!["Slow".to_string()]);
}
