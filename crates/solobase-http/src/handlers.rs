//! Per-route handler logic. Each handler takes the shared [`AppState`], the
//! caller's verified [`Claims`] where authentication is required, and the
//! request's path parameters and body, returning a fully-formed response or
//! an [`HttpError`] for the caller to render.

use bytes::Bytes;
use http::StatusCode;
use solobase_auth::Claims;
use solobase_storage::Caller;

use crate::body::ResponseBody;
use crate::dto::{
    BucketResponse, CreateBucketRequest, CreateFolderRequest, HealthResponse, LoginRequest, LoginResponse,
    MeResponse, ObjectResponse, PatchObjectRequest, RequestUploadRequest, RequestUploadResponse,
};
use crate::error::{HttpError, HttpResult};
use crate::json::{empty_response, json_response, parse_json};
use crate::state::AppState;

/// Builds the ownership-check identity carried alongside a request's
/// verified [`Claims`]. `admin` is the only role that bypasses ownership.
fn caller_from(claims: &Claims) -> Caller {
    Caller {
        user_id: claims.sub.clone(),
        app_id: claims.app_id.clone(),
        is_admin: claims.roles.iter().any(|r| r == "admin"),
    }
}

/// `POST /api/auth/login`. Verifies credentials against a throwaway roles
/// claim, resolves the caller's real roles through IAM, then reissues the
/// token so its roles claim reflects the authorization layer rather than a
/// guess made before the user's identity was confirmed.
pub async fn login(state: &AppState, body: Bytes) -> HttpResult<http::Response<ResponseBody>> {
    let req: LoginRequest = parse_json(&body)?;
    let app_id = state.ctx.config().app_id.as_str();

    let (user, _throwaway_token) = state.auth.login(app_id, &req.email, &req.password, &[]).await?;
    let roles = state.authz.roles_for_user(&user.id).await?;
    let token = state.auth.issue_token_for(&user.id, app_id, &roles)?;

    Ok(json_response(
        StatusCode::OK,
        &LoginResponse { token, user_id: user.id, email: user.email },
    ))
}

/// `POST /api/auth/logout`. Tokens are stateless (signed JWTs), so logout is
/// purely a client-side action; the server just acknowledges it.
pub async fn logout() -> HttpResult<http::Response<ResponseBody>> {
    Ok(empty_response(StatusCode::NO_CONTENT))
}

/// `GET /api/auth/me`.
pub async fn me(claims: &Claims) -> HttpResult<http::Response<ResponseBody>> {
    Ok(json_response(
        StatusCode::OK,
        &MeResponse { user_id: claims.sub.clone(), app_id: claims.app_id.clone(), roles: claims.roles.clone() },
    ))
}

/// `GET /api/storage/buckets`.
pub async fn list_buckets(state: &AppState, claims: &Claims) -> HttpResult<http::Response<ResponseBody>> {
    let buckets = state.storage.list_buckets(&claims.app_id).await?;
    let out: Vec<BucketResponse> = buckets.into_iter().map(Into::into).collect();
    Ok(json_response(StatusCode::OK, &out))
}

/// `POST /api/storage/buckets`.
pub async fn create_bucket(
    state: &AppState,
    claims: &Claims,
    body: Bytes,
) -> HttpResult<http::Response<ResponseBody>> {
    let req: CreateBucketRequest = parse_json(&body)?;
    let bucket = state
        .storage
        .create_bucket(&claims.app_id, &req.name, &claims.sub, req.quota_bytes, req.public)
        .await?;
    Ok(json_response(StatusCode::CREATED, &BucketResponse::from(bucket)))
}

/// `DELETE /api/storage/buckets/{name}?force=true`. `force` cascades the
/// delete onto any live objects still in the bucket; without it a non-empty
/// bucket is rejected with a conflict.
pub async fn delete_bucket(
    state: &AppState,
    claims: &Claims,
    name: &str,
    force: bool,
) -> HttpResult<http::Response<ResponseBody>> {
    state.storage.delete_bucket(&claims.app_id, name, force).await?;
    Ok(empty_response(StatusCode::NO_CONTENT))
}

/// `GET /api/storage/buckets/{name}/objects?prefix=`.
pub async fn list_objects(
    state: &AppState,
    claims: &Claims,
    name: &str,
    prefix: &str,
) -> HttpResult<http::Response<ResponseBody>> {
    let objects = state.storage.list_objects(&claims.app_id, name, prefix).await?;
    let out: Vec<ObjectResponse> = objects.into_iter().map(Into::into).collect();
    Ok(json_response(StatusCode::OK, &out))
}

/// `POST /api/storage/buckets/{name}/folders`.
pub async fn create_folder(
    state: &AppState,
    claims: &Claims,
    name: &str,
    body: Bytes,
) -> HttpResult<http::Response<ResponseBody>> {
    let req: CreateFolderRequest = parse_json(&body)?;
    let object = state.storage.create_folder(&claims.app_id, name, &req.key, &claims.sub).await?;
    Ok(json_response(StatusCode::CREATED, &ObjectResponse::from(object)))
}

/// `POST /api/storage/upload/request`.
pub async fn request_upload(
    state: &AppState,
    claims: &Claims,
    body: Bytes,
) -> HttpResult<http::Response<ResponseBody>> {
    let req: RequestUploadRequest = parse_json(&body)?;
    let token = state
        .storage
        .request_upload(&claims.app_id, &req.bucket, &req.key, &claims.sub, req.expected_bytes)
        .await?;
    Ok(json_response(StatusCode::CREATED, &RequestUploadResponse::from(token)))
}

/// `PUT /api/storage/upload/{token}`. The request body is the raw uploaded
/// bytes, not JSON.
pub async fn complete_upload(
    state: &AppState,
    token: &str,
    body: Bytes,
    content_type: Option<&str>,
) -> HttpResult<http::Response<ResponseBody>> {
    let object = state.storage.complete_upload(token, body, content_type).await?;
    Ok(json_response(StatusCode::OK, &ObjectResponse::from(object)))
}

/// `GET /api/storage/objects/{id}`. Returns the object's raw bytes with its
/// stored content type, not a JSON envelope.
pub async fn download_object(
    state: &AppState,
    claims: &Claims,
    id: &str,
) -> HttpResult<http::Response<ResponseBody>> {
    let downloaded = state.storage.download_by_id(id, &caller_from(claims)).await?;
    let content_type = downloaded.object.content_type.clone().unwrap_or_else(|| "application/octet-stream".to_owned());

    http::Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .header("Content-Length", downloaded.data.len().to_string())
        .body(ResponseBody::from_bytes(downloaded.data))
        .map_err(|e| HttpError::Internal(anyhow::anyhow!("failed to build download response: {e}")))
}

/// `DELETE /api/storage/objects/{id}`.
pub async fn delete_object(
    state: &AppState,
    claims: &Claims,
    id: &str,
) -> HttpResult<http::Response<ResponseBody>> {
    state.storage.delete_object_by_id(id, &caller_from(claims)).await?;
    Ok(empty_response(StatusCode::NO_CONTENT))
}

/// `PATCH /api/storage/objects/{id}`.
pub async fn patch_object(
    state: &AppState,
    claims: &Claims,
    id: &str,
    body: Bytes,
) -> HttpResult<http::Response<ResponseBody>> {
    let req: PatchObjectRequest = parse_json(&body)?;
    let object = state
        .storage
        .patch_object(&claims.app_id, id, req.key.as_deref(), req.bucket.as_deref(), &caller_from(claims))
        .await?;
    Ok(json_response(StatusCode::OK, &ObjectResponse::from(object)))
}

/// `GET /api/admin/storage/health`. Reports readonly mode and the blob
/// reaper's backlog; never fails the request on its own, the dispatcher
/// handles connectivity failures before a handler is ever reached.
pub async fn admin_storage_health(state: &AppState) -> HttpResult<http::Response<ResponseBody>> {
    let report = state.storage.integrity_report().await?;
    Ok(json_response(
        StatusCode::OK,
        &HealthResponse {
            status: "ok",
            readonly: state.ctx.is_readonly(),
            buckets_pending_reap: report.buckets_pending_reap,
            objects_pending_reap: report.objects_pending_reap,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_should_return_no_content_on_logout() {
        let resp = logout().await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_should_echo_claims_from_me() {
        let claims = Claims {
            sub: "user-1".into(),
            app_id: "solobase".into(),
            roles: vec!["admin".into()],
            iat: 0,
            exp: 0,
        };
        let resp = me(&claims).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
