//! End-to-end tests exercising the storage stack against a real (in-memory
//! sqlite) database and a real (tempdir) blob backend.

use std::sync::Arc;

use chrono::Duration;
use solobase_db::Repos;

use crate::blob::{BlobBackend, LocalFsBackend};
use crate::error::StorageError;
use crate::quota::QuotaAccountant;
use crate::service::{Caller, StorageService};
use crate::token::TokenService;

fn owner_caller() -> Caller {
    Caller { user_id: "user-1".into(), app_id: "solobase".into(), is_admin: false }
}

async fn test_service() -> (StorageService, tempfile::TempDir) {
    let pool = solobase_db::connect("sqlite::memory:").await.unwrap();
    let repos = Repos::new(pool);

    let dir = tempfile::tempdir().unwrap();
    let blobs: Arc<dyn BlobBackend> = Arc::new(LocalFsBackend::open(dir.path()).await.unwrap());

    let quota = QuotaAccountant::new(repos.buckets.clone(), repos.quotas.clone(), repos.user_quotas.clone());
    let tokens = TokenService::new(repos.tokens.clone(), quota.clone(), Duration::minutes(15));

    (StorageService::new(repos, blobs, quota, tokens), dir)
}

#[tokio::test]
async fn test_should_create_and_list_buckets() {
    let (svc, _dir) = test_service().await;

    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();
    svc.create_bucket("solobase", "docs", "user-1", Some(1024), false).await.unwrap();

    let buckets = svc.list_buckets("solobase").await.unwrap();
    assert_eq!(buckets.len(), 2);
}

#[tokio::test]
async fn test_should_reject_duplicate_bucket_names() {
    let (svc, _dir) = test_service().await;

    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();
    let err = svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap_err();
    assert!(matches!(err, StorageError::BucketAlreadyExists(_)));
}

#[tokio::test]
async fn test_should_complete_an_upload_and_download_it_back() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "cat.png", "user-1", 5)
        .await
        .unwrap();

    let object = svc
        .complete_upload(&token.id, bytes::Bytes::from("hello"), Some("image/png"))
        .await
        .unwrap();
    assert_eq!(object.object_key, "cat.png");
    assert_eq!(object.size_bytes, 5);

    let downloaded = svc.download("solobase", "photos", "cat.png", "user-1").await.unwrap();
    assert_eq!(downloaded.data.as_ref(), b"hello");
}

#[tokio::test]
async fn test_should_enforce_bucket_quota() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", Some(4), false).await.unwrap();

    let err = svc
        .request_upload("solobase", "photos", "cat.png", "user-1", 5)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::QuotaExceeded { .. }));
}

#[tokio::test]
async fn test_should_reject_an_upload_larger_than_its_declared_size() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "cat.png", "user-1", 2)
        .await
        .unwrap();

    let err = svc
        .complete_upload(&token.id, bytes::Bytes::from("hello"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::QuotaExceeded { .. }));
}

#[tokio::test]
async fn test_should_prevent_a_token_from_completing_twice() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "cat.png", "user-1", 5)
        .await
        .unwrap();

    svc.complete_upload(&token.id, bytes::Bytes::from("hello"), None).await.unwrap();

    let err = svc
        .complete_upload(&token.id, bytes::Bytes::from("again"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidToken));
}

#[tokio::test]
async fn test_should_release_quota_on_aborted_upload() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", Some(10), false).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "cat.png", "user-1", 10)
        .await
        .unwrap();
    svc.abort_upload(&token.id).await.unwrap();

    // quota should be free again for a second reservation of the same size
    svc.request_upload("solobase", "photos", "dog.png", "user-1", 10)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_should_rename_an_object() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "old.png", "user-1", 5)
        .await
        .unwrap();
    svc.complete_upload(&token.id, bytes::Bytes::from("hello"), None).await.unwrap();

    let renamed = svc.rename_object("solobase", "photos", "old.png", "new.png").await.unwrap();
    assert_eq!(renamed.object_key, "new.png");

    let err = svc.download("solobase", "photos", "old.png", "user-1").await.unwrap_err();
    assert!(matches!(err, StorageError::ObjectNotFound(_)));
}

#[tokio::test]
async fn test_should_move_an_object_across_buckets() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "inbox", "user-1", None, false).await.unwrap();
    svc.create_bucket("solobase", "archive", "user-1", None, false).await.unwrap();

    let token = svc
        .request_upload("solobase", "inbox", "report.pdf", "user-1", 5)
        .await
        .unwrap();
    svc.complete_upload(&token.id, bytes::Bytes::from("hello"), None).await.unwrap();

    let moved = svc
        .move_object("solobase", "inbox", "report.pdf", "archive", "report.pdf")
        .await
        .unwrap();
    assert_eq!(moved.object_key, "report.pdf");

    let downloaded = svc.download("solobase", "archive", "report.pdf", "user-1").await.unwrap();
    assert_eq!(downloaded.data.as_ref(), b"hello");
}

#[tokio::test]
async fn test_should_delete_an_object_by_id_and_release_quota() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", Some(10), false).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "cat.png", "user-1", 5)
        .await
        .unwrap();
    let object = svc.complete_upload(&token.id, bytes::Bytes::from("hello"), None).await.unwrap();

    svc.delete_object_by_id(&object.id, &owner_caller()).await.unwrap();

    let err = svc.get_object(&object.id).await.unwrap_err();
    assert!(matches!(err, StorageError::ObjectNotFound(_)));

    // the released bytes are free again for a same-size upload
    svc.request_upload("solobase", "photos", "dog.png", "user-1", 5).await.unwrap();
}

#[tokio::test]
async fn test_should_reject_deleting_an_object_by_id_for_a_non_owner() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "cat.png", "user-1", 5)
        .await
        .unwrap();
    let object = svc.complete_upload(&token.id, bytes::Bytes::from("hello"), None).await.unwrap();

    let intruder = Caller { user_id: "user-2".into(), app_id: "solobase".into(), is_admin: false };
    let err = svc.delete_object_by_id(&object.id, &intruder).await.unwrap_err();
    assert!(matches!(err, StorageError::Forbidden));
}

#[tokio::test]
async fn test_should_allow_admin_to_delete_any_object_by_id() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "cat.png", "user-1", 5)
        .await
        .unwrap();
    let object = svc.complete_upload(&token.id, bytes::Bytes::from("hello"), None).await.unwrap();

    let admin = Caller { user_id: "user-2".into(), app_id: "solobase".into(), is_admin: true };
    svc.delete_object_by_id(&object.id, &admin).await.unwrap();
}

#[tokio::test]
async fn test_should_allow_non_owner_to_download_from_a_public_bucket() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", None, true).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "cat.png", "user-1", 5)
        .await
        .unwrap();
    let object = svc.complete_upload(&token.id, bytes::Bytes::from("hello"), None).await.unwrap();

    let stranger = Caller { user_id: "user-2".into(), app_id: "solobase".into(), is_admin: false };
    let downloaded = svc.download_by_id(&object.id, &stranger).await.unwrap();
    assert_eq!(downloaded.data.as_ref(), b"hello");
}

#[tokio::test]
async fn test_should_reject_a_non_owner_download_from_a_private_bucket() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "cat.png", "user-1", 5)
        .await
        .unwrap();
    let object = svc.complete_upload(&token.id, bytes::Bytes::from("hello"), None).await.unwrap();

    let stranger = Caller { user_id: "user-2".into(), app_id: "solobase".into(), is_admin: false };
    let err = svc.download_by_id(&object.id, &stranger).await.unwrap_err();
    assert!(matches!(err, StorageError::Forbidden));
}

#[tokio::test]
async fn test_should_patch_an_object_by_id() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "old.png", "user-1", 5)
        .await
        .unwrap();
    let object = svc.complete_upload(&token.id, bytes::Bytes::from("hello"), None).await.unwrap();

    let patched = svc
        .patch_object("solobase", &object.id, Some("new.png"), None, &owner_caller())
        .await
        .unwrap();
    assert_eq!(patched.object_key, "new.png");
}

#[tokio::test]
async fn test_should_download_an_object_by_id() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "cat.png", "user-1", 5)
        .await
        .unwrap();
    let object = svc.complete_upload(&token.id, bytes::Bytes::from("hello"), None).await.unwrap();

    let downloaded = svc.download_by_id(&object.id, &owner_caller()).await.unwrap();
    assert_eq!(downloaded.data.as_ref(), b"hello");
}

#[tokio::test]
async fn test_should_list_objects_under_a_prefix() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();
    svc.create_folder("solobase", "photos", "2026/", "user-1").await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "2026/jan.png", "user-1", 5)
        .await
        .unwrap();
    svc.complete_upload(&token.id, bytes::Bytes::from("hello"), None).await.unwrap();

    let objects = svc.list_objects("solobase", "photos", "2026/").await.unwrap();
    assert_eq!(objects.len(), 2);
}

#[tokio::test]
async fn test_should_reject_deleting_a_non_empty_bucket_without_force() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "cat.png", "user-1", 5)
        .await
        .unwrap();
    svc.complete_upload(&token.id, bytes::Bytes::from("hello"), None).await.unwrap();

    let err = svc.delete_bucket("solobase", "photos", false).await.unwrap_err();
    assert!(matches!(err, StorageError::BucketNotEmpty(_)));
}

#[tokio::test]
async fn test_should_force_delete_a_non_empty_bucket() {
    let (svc, _dir) = test_service().await;
    svc.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

    let token = svc
        .request_upload("solobase", "photos", "cat.png", "user-1", 5)
        .await
        .unwrap();
    svc.complete_upload(&token.id, bytes::Bytes::from("hello"), None).await.unwrap();

    svc.delete_bucket("solobase", "photos", true).await.unwrap();
    assert!(svc.list_buckets("solobase").await.unwrap().is_empty());
}
