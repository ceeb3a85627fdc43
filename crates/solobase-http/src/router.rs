//! Matches method + path against the fixed built-in routes (spec §6),
//! falling through to extension routes handled separately by the
//! dispatcher.

use http::Method;

/// A resolved built-in route, with any path parameters already extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `POST /api/auth/login`
    AuthLogin,
    /// `POST /api/auth/logout`
    AuthLogout,
    /// `GET /api/auth/me`
    AuthMe,
    /// `GET /api/storage/buckets`
    ListBuckets,
    /// `POST /api/storage/buckets`
    CreateBucket,
    /// `DELETE /api/storage/buckets/{name}`
    DeleteBucket {
        /// Bucket name.
        name: String,
    },
    /// `GET /api/storage/buckets/{name}/objects`
    ListObjects {
        /// Bucket name.
        name: String,
    },
    /// `POST /api/storage/buckets/{name}/folders`
    CreateFolder {
        /// Bucket name.
        name: String,
    },
    /// `POST /api/storage/upload/request`
    RequestUpload,
    /// `PUT /api/storage/upload/{token}`
    CompleteUpload {
        /// Upload token id.
        token: String,
    },
    /// `GET /api/storage/objects/{id}`
    DownloadObject {
        /// Object id.
        id: String,
    },
    /// `DELETE /api/storage/objects/{id}`
    DeleteObject {
        /// Object id.
        id: String,
    },
    /// `PATCH /api/storage/objects/{id}`
    PatchObject {
        /// Object id.
        id: String,
    },
    /// `GET /api/admin/storage/health`
    AdminStorageHealth,
    /// `/api/ext/<name>/...` or `/admin/ext/<name>/...`, handled by the
    /// extension registry rather than a built-in handler.
    Extension,
    /// Nothing matched.
    NotFound,
}

/// Resolve a built-in route from method and path. Extension paths
/// (`/api/ext/*`, `/admin/ext/*`) resolve to [`Route::Extension`] and are
/// dispatched separately.
#[must_use]
pub fn resolve(method: &Method, path: &str) -> Route {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let seg = segments.as_slice();

    if matches!(seg, ["api", "ext", ..] | ["admin", "ext", ..]) {
        return Route::Extension;
    }

    match (method, seg) {
        (&Method::POST, ["api", "auth", "login"]) => Route::AuthLogin,
        (&Method::POST, ["api", "auth", "logout"]) => Route::AuthLogout,
        (&Method::GET, ["api", "auth", "me"]) => Route::AuthMe,

        (&Method::GET, ["api", "storage", "buckets"]) => Route::ListBuckets,
        (&Method::POST, ["api", "storage", "buckets"]) => Route::CreateBucket,
        (&Method::DELETE, ["api", "storage", "buckets", name]) => {
            Route::DeleteBucket { name: (*name).to_owned() }
        }
        (&Method::GET, ["api", "storage", "buckets", name, "objects"]) => {
            Route::ListObjects { name: (*name).to_owned() }
        }
        (&Method::POST, ["api", "storage", "buckets", name, "folders"]) => {
            Route::CreateFolder { name: (*name).to_owned() }
        }

        (&Method::POST, ["api", "storage", "upload", "request"]) => Route::RequestUpload,
        (&Method::PUT, ["api", "storage", "upload", token]) => {
            Route::CompleteUpload { token: (*token).to_owned() }
        }

        (&Method::GET, ["api", "storage", "objects", id]) => Route::DownloadObject { id: (*id).to_owned() },
        (&Method::DELETE, ["api", "storage", "objects", id]) => Route::DeleteObject { id: (*id).to_owned() },
        (&Method::PATCH, ["api", "storage", "objects", id]) => Route::PatchObject { id: (*id).to_owned() },

        (&Method::GET, ["api", "admin", "storage", "health"]) => Route::AdminStorageHealth,

        _ => Route::NotFound,
    }
}

/// Whether a path requires the caller to be authenticated. Only login is
/// exempt; the admin health probe still requires a bearer token, gated by
/// the usual path policy rather than a blanket bypass.
#[must_use]
pub fn requires_auth(route: &Route) -> bool {
    !matches!(route, Route::AuthLogin)
}

/// A coarse bucket used to scope rate limiting; write endpoints get a
/// tighter effective budget than reads since they carry more cost.
#[must_use]
pub fn route_class(method: &Method) -> &'static str {
    if matches!(*method, Method::GET | Method::HEAD) {
        "read"
    } else {
        "write"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_resolve_auth_routes() {
        assert_eq!(resolve(&Method::POST, "/api/auth/login"), Route::AuthLogin);
        assert_eq!(resolve(&Method::GET, "/api/auth/me"), Route::AuthMe);
    }

    #[test]
    fn test_should_resolve_bucket_routes_with_params() {
        assert_eq!(
            resolve(&Method::DELETE, "/api/storage/buckets/photos"),
            Route::DeleteBucket { name: "photos".to_owned() }
        );
        assert_eq!(
            resolve(&Method::GET, "/api/storage/buckets/photos/objects"),
            Route::ListObjects { name: "photos".to_owned() }
        );
    }

    #[test]
    fn test_should_resolve_upload_routes() {
        assert_eq!(resolve(&Method::POST, "/api/storage/upload/request"), Route::RequestUpload);
        assert_eq!(
            resolve(&Method::PUT, "/api/storage/upload/tok-1"),
            Route::CompleteUpload { token: "tok-1".to_owned() }
        );
    }

    #[test]
    fn test_should_resolve_object_routes() {
        assert_eq!(
            resolve(&Method::GET, "/api/storage/objects/obj-1"),
            Route::DownloadObject { id: "obj-1".to_owned() }
        );
        assert_eq!(
            resolve(&Method::PATCH, "/api/storage/objects/obj-1"),
            Route::PatchObject { id: "obj-1".to_owned() }
        );
    }

    #[test]
    fn test_should_route_extension_paths() {
        assert_eq!(resolve(&Method::GET, "/api/ext/notes/list"), Route::Extension);
        assert_eq!(resolve(&Method::GET, "/admin/ext/notes/config"), Route::Extension);
    }

    #[test]
    fn test_should_return_not_found_for_unknown_path() {
        assert_eq!(resolve(&Method::GET, "/api/nonexistent"), Route::NotFound);
    }

    #[test]
    fn test_should_classify_routes_for_rate_limiting() {
        assert_eq!(route_class(&Method::GET), "read");
        assert_eq!(route_class(&Method::POST), "write");
    }

    #[test]
    fn test_should_require_auth_except_for_login() {
        assert!(!requires_auth(&Route::AuthLogin));
        assert!(requires_auth(&Route::AuthMe));
    }
}
