//! Maps every domain error into the `{error, code}` JSON body and HTTP
//! status mapping from the error handling design.

use bytes::Bytes;
use serde::Serialize;

use crate::body::ResponseBody;

/// A single JSON-serializable error envelope.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: String,
}

/// Error kinds shared across domain crates, each carrying its own HTTP
/// status and stable machine-readable code.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Malformed input: bad names, malformed JSON, unsupported content type.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Missing or invalid credentials/bearer token.
    #[error("unauthenticated")]
    Unauthenticated,
    /// Authenticated but lacking permission.
    #[error("forbidden")]
    Forbidden,
    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A uniqueness violation or duplicate name.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A byte-size quota was exceeded.
    #[error("quota exceeded: requested {requested}, available {available}")]
    QuotaExceeded {
        /// Bytes requested.
        requested: i64,
        /// Bytes actually available.
        available: i64,
    },
    /// A per-user rate limit was exceeded.
    #[error("rate limited")]
    RateLimited,
    /// A token has expired or is otherwise invalid for use.
    #[error("expired or invalid token")]
    ExpiredOrInvalidToken,
    /// An internal error not meant for client consumption in detail.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
    /// The server is in read-only mode or draining for shutdown.
    #[error("service unavailable")]
    Unavailable,
}

impl HttpError {
    fn status(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::QuotaExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::ExpiredOrInvalidToken => StatusCode::GONE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::RateLimited => "rate_limited",
            Self::ExpiredOrInvalidToken => "expired_or_invalid_token",
            Self::Internal(_) => "internal",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Converts a domain error into a fully-formed JSON error response.
///
/// Never includes the underlying cause's `Display` text for `Internal`
/// errors in the body, since that may carry SQL, file paths, or other
/// details not meant for clients; those are logged separately by the
/// caller before this is invoked.
pub trait IntoErrorResponse {
    /// Render this error as an HTTP response.
    fn into_error_response(self) -> http::Response<ResponseBody>;
}

impl IntoErrorResponse for HttpError {
    fn into_error_response(self) -> http::Response<ResponseBody> {
        let status = self.status();
        let code = self.code();
        let message = match &self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        };

        let body = ErrorBody { error: message, code: code.to_owned() };
        let json = serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec());

        http::Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(ResponseBody::from_bytes(Bytes::from(json)))
            .expect("error response is always well-formed")
    }
}

impl From<solobase_storage::StorageError> for HttpError {
    fn from(err: solobase_storage::StorageError) -> Self {
        use solobase_storage::StorageError as E;
        match err {
            E::InvalidName { .. } => Self::InvalidInput(err.to_string()),
            E::BucketNotFound(name) => Self::NotFound(format!("bucket {name} not found")),
            E::ObjectNotFound(key) => Self::NotFound(format!("object {key} not found")),
            E::BucketAlreadyExists(name) => Self::Conflict(format!("bucket {name} already exists")),
            E::ObjectAlreadyExists(key) => Self::Conflict(format!("object {key} already exists")),
            E::QuotaExceeded { requested, available } => Self::QuotaExceeded { requested, available },
            E::InvalidToken => Self::ExpiredOrInvalidToken,
            E::HashMismatch { .. } => Self::InvalidInput(err.to_string()),
            E::ReadOnly => Self::Unavailable,
            E::Forbidden => Self::Forbidden,
            E::BucketNotEmpty(name) => Self::Conflict(format!("bucket {name} is not empty")),
            E::Io(_) | E::Db(_) | E::Internal(_) => Self::Internal(anyhow::anyhow!(err.to_string())),
        }
    }
}

impl From<solobase_auth::AuthError> for HttpError {
    fn from(err: solobase_auth::AuthError) -> Self {
        use solobase_auth::AuthError as E;
        match err {
            E::InvalidCredentials | E::AccountDeactivated => Self::Unauthenticated,
            E::InvalidToken => Self::Unauthenticated,
            E::TokenExpired => Self::ExpiredOrInvalidToken,
            E::UnsafeRedirect => Self::InvalidInput(err.to_string()),
            E::Db(_) | E::Internal(_) => Self::Internal(anyhow::anyhow!(err.to_string())),
        }
    }
}

impl From<solobase_iam::IamError> for HttpError {
    fn from(err: solobase_iam::IamError) -> Self {
        use solobase_iam::IamError as E;
        match err {
            E::Denied { .. } => Self::Forbidden,
            E::RateLimited => Self::RateLimited,
            E::QuotaExceeded { requested, available } => Self::QuotaExceeded { requested, available },
            E::Db(_) => Self::Internal(anyhow::anyhow!(err.to_string())),
        }
    }
}

impl From<solobase_extensions::ExtensionError> for HttpError {
    fn from(err: solobase_extensions::ExtensionError) -> Self {
        use solobase_extensions::ExtensionError as E;
        match err {
            E::NotRegistered(name) => Self::NotFound(format!("extension {name} not found")),
            E::InvalidTransition { .. } | E::HandlerPanicked(_) => {
                Self::Internal(anyhow::anyhow!(err.to_string()))
            }
            E::Db(_) => Self::Internal(anyhow::anyhow!(err.to_string())),
        }
    }
}

impl From<solobase_db::DbError> for HttpError {
    fn from(err: solobase_db::DbError) -> Self {
        use solobase_db::DbError as E;
        match err {
            E::NotFound => Self::NotFound("resource not found".to_owned()),
            E::Conflict => Self::Conflict("resource already exists".to_owned()),
            E::Sqlx(_) | E::Migrate(_) => Self::Internal(anyhow::anyhow!(err.to_string())),
        }
    }
}

/// Convenience result type used by HTTP handlers.
pub type HttpResult<T> = Result<T, HttpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_not_found_to_404() {
        let resp = HttpError::NotFound("x".into()).into_error_response();
        assert_eq!(resp.status(), http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_should_map_quota_exceeded_to_413() {
        let resp = HttpError::QuotaExceeded { requested: 10, available: 5 }.into_error_response();
        assert_eq!(resp.status(), http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_should_map_rate_limited_to_429() {
        let resp = HttpError::RateLimited.into_error_response();
        assert_eq!(resp.status(), http::StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_should_hide_internal_error_detail_from_body() {
        let err = HttpError::Internal(anyhow::anyhow!("select * from users failed: secret"));
        let resp = err.into_error_response();
        assert_eq!(resp.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_should_map_storage_bucket_not_found() {
        let err: HttpError = solobase_storage::StorageError::BucketNotFound("photos".into()).into();
        assert!(matches!(err, HttpError::NotFound(_)));
    }

    #[test]
    fn test_should_map_auth_invalid_credentials_to_unauthenticated() {
        let err: HttpError = solobase_auth::AuthError::InvalidCredentials.into();
        assert!(matches!(err, HttpError::Unauthenticated));
    }

    #[test]
    fn test_should_map_iam_denied_to_forbidden() {
        let err: HttpError =
            solobase_iam::IamError::Denied { method: "GET".into(), path: "/x".into() }.into();
        assert!(matches!(err, HttpError::Forbidden));
    }
}
