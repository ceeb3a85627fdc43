//! The hyper [`Service`] tying routing, authentication, authorization, and
//! the per-route handlers together into one request pipeline: resolve route
//! → collect body → authenticate → authorize → readonly gate → dispatch →
//! render errors. Grounded on the host platform's S3 HTTP service pipeline.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::request::Parts;
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use percent_encoding::percent_decode_str;
use solobase_auth::Claims;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::body::ResponseBody;
use crate::error::{HttpError, HttpResult, IntoErrorResponse};
use crate::handlers;
use crate::json::empty_response;
use crate::router::{self, Route};
use crate::state::AppState;

/// Maximum request body accepted before it's rejected as too large. Matches
/// the object size a single `complete_upload` call is expected to carry in
/// one buffered frame; larger transfers should be chunked by the caller
/// across multiple upload tokens.
const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

/// The Solobase HTTP dispatcher, cheaply cloned per connection.
#[derive(Clone)]
pub struct SolobaseService {
    state: AppState,
}

impl SolobaseService {
    /// Build the service over the shared application state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl Service<Request<Incoming>> for SolobaseService {
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Infallible>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let state = self.state.clone();
        Box::pin(async move { Ok(process_request(state, req).await) })
    }
}

async fn process_request(state: AppState, req: Request<Incoming>) -> Response<ResponseBody> {
    let request_id = Uuid::new_v4();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let span = info_span!("request", %request_id, method = %method, path = %path);
    async move {
        let response = handle(state, req).await;
        info!(status = response.status().as_u16(), "request completed");
        response
    }
    .instrument(span)
    .await
}

async fn handle(state: AppState, req: Request<Incoming>) -> Response<ResponseBody> {
    let route = router::resolve(req.method(), req.uri().path());

    if route == Route::NotFound {
        return empty_response(StatusCode::NOT_FOUND);
    }

    let query = req.uri().query().unwrap_or("").to_owned();
    let path = req.uri().path().to_owned();
    let (parts, body) = req.into_parts();

    let body = match collect_body(body).await {
        Ok(bytes) => bytes,
        Err(err) => return err.into_error_response(),
    };

    match dispatch(&state, &parts, &route, &path, &query, body).await {
        Ok(resp) => resp,
        Err(err) => {
            if matches!(err, HttpError::Internal(_)) {
                error!(error = %err, "internal error handling request");
            }
            err.into_error_response()
        }
    }
}

async fn collect_body(body: Incoming) -> HttpResult<Bytes> {
    let collected = body
        .collect()
        .await
        .map_err(|e| HttpError::InvalidInput(format!("failed to read request body: {e}")))?
        .to_bytes();

    if collected.len() > MAX_BODY_BYTES {
        return Err(HttpError::InvalidInput("request body too large".to_owned()));
    }

    Ok(collected)
}

async fn dispatch(
    state: &AppState,
    parts: &Parts,
    route: &Route,
    path: &str,
    query: &str,
    body: Bytes,
) -> HttpResult<Response<ResponseBody>> {
    if matches!(route, Route::Extension) {
        return dispatch_extension(state, parts, path, body).await;
    }

    let claims = authenticate_and_authorize(state, parts, route, path, &body).await?;

    if is_write_route(route) && state.ctx.is_readonly() {
        return Err(HttpError::Unavailable);
    }

    dispatch_builtin(state, parts, route, query, body, claims.as_ref()).await
}

async fn authenticate_and_authorize(
    state: &AppState,
    parts: &Parts,
    route: &Route,
    path: &str,
    body: &Bytes,
) -> HttpResult<Option<Claims>> {
    if !router::requires_auth(route) {
        return Ok(None);
    }

    let token = bearer_token(&parts.headers).ok_or(HttpError::Unauthenticated)?;
    let claims = state.auth.verify_token(token)?;

    let route_class = router::route_class(&parts.method);
    let upload_size_hint = upload_size_hint(route, body);
    state
        .authz
        .authorize(&claims.app_id, &claims.sub, route_class, parts.method.as_str(), path, upload_size_hint)
        .await?;

    Ok(Some(claims))
}

/// The byte size an upload-intent route is about to commit to, used for the
/// advisory `EnforceQuota` pre-check. `None` for every other route.
fn upload_size_hint(route: &Route, body: &Bytes) -> Option<i64> {
    match route {
        Route::RequestUpload => {
            #[derive(serde::Deserialize)]
            struct SizeHint {
                expected_bytes: i64,
            }
            serde_json::from_slice::<SizeHint>(body).ok().map(|h| h.expected_bytes)
        }
        Route::CompleteUpload { .. } => Some(body.len() as i64),
        _ => None,
    }
}

async fn dispatch_builtin(
    state: &AppState,
    parts: &Parts,
    route: &Route,
    query: &str,
    body: Bytes,
    claims: Option<&Claims>,
) -> HttpResult<Response<ResponseBody>> {
    match route {
        Route::AuthLogin => handlers::login(state, body).await,
        Route::AuthLogout => handlers::logout().await,
        Route::AuthMe => handlers::me(require_claims(claims)?).await,
        Route::ListBuckets => handlers::list_buckets(state, require_claims(claims)?).await,
        Route::CreateBucket => handlers::create_bucket(state, require_claims(claims)?, body).await,
        Route::DeleteBucket { name } => {
            let force = query_param(query, "force").is_some_and(|v| v == "true");
            handlers::delete_bucket(state, require_claims(claims)?, name, force).await
        }
        Route::ListObjects { name } => {
            let prefix = query_param(query, "prefix").unwrap_or_default();
            handlers::list_objects(state, require_claims(claims)?, name, &prefix).await
        }
        Route::CreateFolder { name } => {
            handlers::create_folder(state, require_claims(claims)?, name, body).await
        }
        Route::RequestUpload => handlers::request_upload(state, require_claims(claims)?, body).await,
        Route::CompleteUpload { token } => {
            let content_type = parts.headers.get(http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
            handlers::complete_upload(state, token, body, content_type).await
        }
        Route::DownloadObject { id } => handlers::download_object(state, require_claims(claims)?, id).await,
        Route::DeleteObject { id } => handlers::delete_object(state, require_claims(claims)?, id).await,
        Route::PatchObject { id } => handlers::patch_object(state, require_claims(claims)?, id, body).await,
        Route::AdminStorageHealth => handlers::admin_storage_health(state).await,
        Route::Extension | Route::NotFound => {
            unreachable!("extension and not-found routes are handled before dispatch_builtin")
        }
    }
}

async fn dispatch_extension(
    state: &AppState,
    parts: &Parts,
    path: &str,
    body: Bytes,
) -> HttpResult<Response<ResponseBody>> {
    let token = bearer_token(&parts.headers).ok_or(HttpError::Unauthenticated)?;
    let claims = state.auth.verify_token(token)?;

    let route_class = router::route_class(&parts.method);
    state
        .authz
        .authorize(&claims.app_id, &claims.sub, route_class, parts.method.as_str(), path, None)
        .await?;

    if route_class == "write" && state.ctx.is_readonly() {
        return Err(HttpError::Unavailable);
    }

    let mut req = Request::builder().method(parts.method.clone()).uri(parts.uri.clone());
    if let Some(headers) = req.headers_mut() {
        *headers = parts.headers.clone();
    }
    let req = req
        .body(body)
        .map_err(|e| HttpError::Internal(anyhow::anyhow!("failed to rebuild extension request: {e}")))?;

    match state.extensions.dispatch(path, req).await {
        Some(resp) => {
            let (parts, body) = resp.into_parts();
            Ok(Response::from_parts(parts, ResponseBody::from_bytes(body)))
        }
        None => Err(HttpError::NotFound(format!("no extension mounted at {path}"))),
    }
}

fn require_claims(claims: Option<&Claims>) -> HttpResult<&Claims> {
    claims.ok_or(HttpError::Unauthenticated)
}

fn bearer_token(headers: &http::HeaderMap) -> Option<&str> {
    headers.get(http::header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

fn is_write_route(route: &Route) -> bool {
    matches!(
        route,
        Route::CreateBucket
            | Route::DeleteBucket { .. }
            | Route::CreateFolder { .. }
            | Route::RequestUpload
            | Route::CompleteUpload { .. }
            | Route::DeleteObject { .. }
            | Route::PatchObject { .. }
    )
}

fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == key {
            Some(percent_decode_str(v).decode_utf8_lossy().into_owned())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_extract_bearer_token() {
        let mut headers = http::HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn test_should_reject_non_bearer_auth_header() {
        let mut headers = http::HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_should_parse_query_param() {
        assert_eq!(query_param("prefix=photos%2F2024", "prefix"), Some("photos/2024".to_owned()));
        assert_eq!(query_param("other=1", "prefix"), None);
    }

    #[test]
    fn test_should_classify_write_routes() {
        assert!(is_write_route(&Route::CreateBucket));
        assert!(!is_write_route(&Route::ListBuckets));
    }
}
