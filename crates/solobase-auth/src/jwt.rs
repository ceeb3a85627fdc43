//! Bearer token issuance and verification.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Claims carried by a Solobase bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id this token authenticates.
    pub sub: String,
    /// Tenant isolation key.
    pub app_id: String,
    /// Role names granted to the subject at issuance time.
    pub roles: Vec<String>,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

/// Issues and verifies HS256 bearer tokens signed with the configured
/// `JWT_SECRET`.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Build an issuer from the raw HMAC secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issue a token for `user_id` valid for `ttl`.
    pub fn issue(&self, user_id: &str, app_id: &str, roles: &[String], ttl: Duration) -> AuthResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_owned(),
            app_id: app_id.to_owned(),
            roles: roles.to_vec(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("failed to sign token: {e}")))
    }

    /// Verify a bearer token's signature and expiry, returning its claims.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_round_trip_a_token() {
        let issuer = TokenIssuer::new("test-secret");
        let token = issuer
            .issue("user-1", "solobase", &["admin".to_owned()], Duration::minutes(5))
            .unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.app_id, "solobase");
        assert_eq!(claims.roles, vec!["admin".to_owned()]);
    }

    #[test]
    fn test_should_reject_an_expired_token() {
        let issuer = TokenIssuer::new("test-secret");
        let token = issuer
            .issue("user-1", "solobase", &[], Duration::seconds(-5))
            .unwrap();

        let err = issuer.verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn test_should_reject_a_token_signed_with_a_different_secret() {
        let issuer_a = TokenIssuer::new("secret-a");
        let issuer_b = TokenIssuer::new("secret-b");

        let token = issuer_a.issue("user-1", "solobase", &[], Duration::minutes(5)).unwrap();
        let err = issuer_b.verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }
}
