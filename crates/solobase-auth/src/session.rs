//! Session cookie construction and redirect-target validation.

use crate::error::{AuthError, AuthResult};

/// Name of the session cookie carrying the bearer token.
pub const SESSION_COOKIE_NAME: &str = "solobase_session";

/// Build a `Set-Cookie` header value binding `token` to the session
/// cookie, scoped `HttpOnly`, `SameSite=Strict`, and `Secure` so it is
/// never readable from script and never sent cross-site.
#[must_use]
pub fn build_session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age={max_age_secs}"
    )
}

/// Build the header value that clears the session cookie on logout.
#[must_use]
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=0")
}

/// Validate that `target` is a same-origin, relative redirect path.
///
/// Rejects absolute URLs and protocol-relative (`//host/...`) targets to
/// prevent open-redirect abuse after login.
///
/// # Errors
///
/// Returns [`AuthError::UnsafeRedirect`] if `target` is not a bare,
/// same-origin path.
pub fn validate_redirect_target(target: &str) -> AuthResult<()> {
    if target.is_empty() || !target.starts_with('/') || target.starts_with("//") {
        return Err(AuthError::UnsafeRedirect);
    }
    if target.contains("://") {
        return Err(AuthError::UnsafeRedirect);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_build_a_hardened_session_cookie() {
        let cookie = build_session_cookie("abc123", 3600);
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=3600"));
    }

    #[test]
    fn test_should_accept_relative_redirect() {
        assert!(validate_redirect_target("/dashboard").is_ok());
    }

    #[test]
    fn test_should_reject_absolute_redirect() {
        assert!(validate_redirect_target("https://evil.example/phish").is_err());
    }

    #[test]
    fn test_should_reject_protocol_relative_redirect() {
        assert!(validate_redirect_target("//evil.example").is_err());
    }

    #[test]
    fn test_should_reject_empty_redirect() {
        assert!(validate_redirect_target("").is_err());
    }
}
