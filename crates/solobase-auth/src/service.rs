//! Identity service: registration, login, and token verification.

use chrono::Duration;
use solobase_db::{User, UserRepo};

use crate::error::{AuthError, AuthResult};
use crate::jwt::{Claims, TokenIssuer};
use crate::password::{hash_password, verify_password};

/// Ties the user repository, password hashing, and token issuance
/// together into the operations the HTTP surface calls.
#[derive(Debug, Clone)]
pub struct AuthService {
    users: UserRepo,
    issuer: TokenIssuer,
    token_ttl: Duration,
}

impl AuthService {
    /// Build the service over its dependencies.
    #[must_use]
    pub fn new(users: UserRepo, jwt_secret: &str, token_ttl: Duration) -> Self {
        Self {
            users,
            issuer: TokenIssuer::new(jwt_secret),
            token_ttl,
        }
    }

    /// Register a new user with a freshly hashed password.
    pub async fn register(
        &self,
        app_id: &str,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AuthResult<User> {
        let password_hash = hash_password(password)?;
        Ok(self.users.create(app_id, email, &password_hash, display_name).await?)
    }

    /// Verify credentials and issue a bearer token, given the roles
    /// resolved by the IAM layer for this user.
    pub async fn login(
        &self,
        app_id: &str,
        email: &str,
        password: &str,
        roles: &[String],
    ) -> AuthResult<(User, String)> {
        let user = self
            .users
            .get_by_email(app_id, email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        verify_password(password, &user.password_hash)?;

        let token = self.issuer.issue(&user.id, app_id, roles, self.token_ttl)?;
        Ok((user, token))
    }

    /// Verify a bearer token and return its claims.
    pub fn verify_token(&self, token: &str) -> AuthResult<Claims> {
        self.issuer.verify(token)
    }

    /// Issue a fresh token for an already-authenticated user, carrying the
    /// roles resolved by the IAM layer. Used after [`Self::login`] once the
    /// caller's roles are known, since the token's roles claim must reflect
    /// the authorization layer's view rather than a guess made before the
    /// user's identity was confirmed.
    pub fn issue_token_for(&self, user_id: &str, app_id: &str, roles: &[String]) -> AuthResult<String> {
        self.issuer.issue(user_id, app_id, roles, self.token_ttl)
    }

    /// Whether a tenant has no users yet, gating the bootstrap-admin path.
    pub async fn needs_bootstrap(&self, app_id: &str) -> AuthResult<bool> {
        Ok(!self.users.any_exists(app_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer_for_test() -> TokenIssuer {
        TokenIssuer::new("test-secret")
    }

    #[test]
    fn test_token_issuer_is_reusable_across_users() {
        let issuer = issuer_for_test();
        let a = issuer.issue("user-a", "solobase", &[], Duration::minutes(5)).unwrap();
        let b = issuer.issue("user-b", "solobase", &[], Duration::minutes(5)).unwrap();
        assert_ne!(a, b);
    }
}
