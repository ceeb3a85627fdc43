//! Wire-format request/response bodies. Kept separate from the row types
//! in `solobase-db` so the persistence layer never carries a `serde`
//! dependency it doesn't otherwise need.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solobase_db::{Bucket, Object, UploadToken, User};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub app_id: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BucketResponse {
    pub id: String,
    pub name: String,
    pub owner_user_id: String,
    pub quota_bytes: Option<i64>,
    pub used_bytes: i64,
    pub public: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Bucket> for BucketResponse {
    fn from(b: Bucket) -> Self {
        Self {
            id: b.id,
            name: b.name,
            owner_user_id: b.owner_user_id,
            quota_bytes: b.quota_bytes,
            used_bytes: b.used_bytes,
            public: b.public,
            created_at: b.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBucketRequest {
    pub name: String,
    pub quota_bytes: Option<i64>,
    #[serde(default)]
    pub public: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct ObjectResponse {
    pub id: String,
    pub bucket_id: String,
    pub object_key: String,
    pub size_bytes: i64,
    pub content_type: Option<String>,
    pub is_folder: bool,
    pub owner_user_id: String,
    pub parent_folder_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Object> for ObjectResponse {
    fn from(o: Object) -> Self {
        Self {
            id: o.id,
            bucket_id: o.bucket_id,
            object_key: o.object_key,
            size_bytes: o.size_bytes,
            content_type: o.content_type,
            is_folder: o.is_folder,
            owner_user_id: o.user_id,
            parent_folder_id: o.parent_folder_id,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RequestUploadRequest {
    pub bucket: String,
    pub key: String,
    pub expected_bytes: i64,
}

#[derive(Debug, Serialize)]
pub struct RequestUploadResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<UploadToken> for RequestUploadResponse {
    fn from(t: UploadToken) -> Self {
        Self { token: t.id, expires_at: t.expires_at }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchObjectRequest {
    pub key: Option<String>,
    pub bucket: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub readonly: bool,
    pub buckets_pending_reap: usize,
    pub objects_pending_reap: usize,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self { id: u.id, email: u.email, display_name: u.display_name }
    }
}
