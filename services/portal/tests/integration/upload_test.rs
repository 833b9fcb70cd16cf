use bytes::Bytes;
use uuid::Uuid;

use portal::error::{Collaborator, PortalError, RemoteError};
use portal::usecase::upload::{ImageBuckets, ImageFile, ImageKind, ImageStore};
use portal_domain::id::UserId;
use portal_testing::MemoryStorage;
use portal_testing::storage::PUBLIC_BASE;

const MIB: usize = 1024 * 1024;

fn image(name: &str, content_type: &str, len: usize) -> ImageFile {
    ImageFile {
        name: name.to_owned(),
        content_type: content_type.to_owned(),
        bytes: Bytes::from(vec![0u8; len]),
    }
}

fn store() -> (ImageStore<MemoryStorage>, MemoryStorage) {
    let storage = MemoryStorage::new();
    (ImageStore::new(storage.clone(), ImageBuckets::default()), storage)
}

// ── Preconditions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_reject_oversized_image_before_any_remote_call() {
    let (images, storage) = store();
    let owner = UserId(Uuid::new_v4());

    let err = images
        .upload(ImageKind::Profile, owner, &image("photo.png", "image/png", 6 * MIB))
        .await
        .unwrap_err();

    assert!(matches!(err, PortalError::ImageTooLarge { .. }));
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn should_reject_non_image_before_any_remote_call() {
    let (images, storage) = store();
    let owner = UserId(Uuid::new_v4());

    let err = images
        .upload(ImageKind::Family, owner, &image("notes.txt", "text/plain", MIB))
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::InvalidImageType { .. }));

    // Type is checked before size.
    let err = images
        .upload(ImageKind::Family, owner, &image("notes.txt", "text/plain", 6 * MIB))
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::InvalidImageType { .. }));
    assert_eq!(storage.calls(), 0);
}

// ── Upload / delete ──────────────────────────────────────────────────────────

#[tokio::test]
async fn should_store_profile_photo_under_owner_folder() {
    let (images, storage) = store();
    let owner = UserId(Uuid::new_v4());

    let url = images
        .upload(ImageKind::Profile, owner, &image("me.jpeg", "image/jpeg", 5 * MIB))
        .await
        .unwrap();

    let paths = storage.paths("employee-profiles");
    assert_eq!(paths.len(), 1);
    let path = &paths[0];
    assert!(path.starts_with(&format!("{owner}/")));
    assert!(path.ends_with(".jpeg"));
    assert_eq!(url, format!("{PUBLIC_BASE}/employee-profiles/{path}"));
    let object = storage.object("employee-profiles", path).unwrap();
    assert_eq!(object.content_type, "image/jpeg");
    assert_eq!(object.bytes.len(), 5 * MIB);
}

#[tokio::test]
async fn should_keep_family_photos_in_their_own_bucket() {
    let (images, storage) = store();
    let owner = UserId(Uuid::new_v4());

    images
        .upload(ImageKind::Family, owner, &image("son.png", "image/png", 1024))
        .await
        .unwrap();

    assert_eq!(storage.paths("family-profiles").len(), 1);
    assert!(storage.paths("employee-profiles").is_empty());
}

#[tokio::test]
async fn should_delete_object_named_by_public_url() {
    let (images, storage) = store();
    let owner = UserId(Uuid::new_v4());
    let url = images
        .upload(ImageKind::Family, owner, &image("son.png", "image/png", 1024))
        .await
        .unwrap();

    assert!(images.delete(ImageKind::Family, &url).await.unwrap());
    assert!(storage.paths("family-profiles").is_empty());
}

#[tokio::test]
async fn should_skip_delete_when_url_names_no_object() {
    let (images, storage) = store();

    assert!(!images.delete(ImageKind::Profile, "avatar.png").await.unwrap());
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn should_propagate_storage_failure_on_delete() {
    let (images, storage) = store();
    storage.fail_next(
        RemoteError::new(Collaborator::Storage, "Object not found").with_status(404),
    );

    let err = images
        .delete(ImageKind::Profile, &format!("{PUBLIC_BASE}/employee-profiles/u/1.png"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Object not found");
}
