//! Authorization service: the single entry point the HTTP dispatcher calls
//! per request.

use std::sync::Arc;

use solobase_core::RateLimitConfig;
use solobase_db::{RoleRepo, UserQuotaRepo};

use crate::error::{IamError, IamResult};
use crate::policy::PolicyEngine;
use crate::rate_limit::RateLimiter;

/// Resolves roles, evaluates path policies, gates quota, and enforces rate
/// limits for an incoming request, in the fixed order `ResolveRoles →
/// EnforcePathPolicy → EnforceQuota → RateLimit` (authentication itself
/// happens one layer up, in `solobase-http`, before this is called).
///
/// Cheaply `Clone`: the rate limiter's bucket map lives behind an `Arc` so
/// every clone shares the same in-process limiter state rather than
/// starting each connection's rate limiting over from scratch.
#[derive(Debug, Clone)]
pub struct AuthorizationService {
    policy: PolicyEngine,
    user_quotas: UserQuotaRepo,
    rate_limiter: Arc<RateLimiter>,
}

impl AuthorizationService {
    /// Build the service over the role repository, the user quota
    /// repository, and rate limit configuration.
    #[must_use]
    pub fn new(roles: RoleRepo, user_quotas: UserQuotaRepo, rate_limit: RateLimitConfig) -> Self {
        Self {
            policy: PolicyEngine::new(roles),
            user_quotas,
            rate_limiter: Arc::new(RateLimiter::new(rate_limit)),
        }
    }

    /// Authorize a request: resolve the user's roles, evaluate path
    /// policies, advisory-check the upload quota, then apply the rate
    /// limit last so only requests that would otherwise be admitted
    /// consume rate-limit budget.
    ///
    /// `upload_size_hint` is `Some(bytes)` for upload-intent endpoints and
    /// `None` otherwise; the quota check is a no-op when it's `None`.
    pub async fn authorize(
        &self,
        app_id: &str,
        user_id: &str,
        route_class: &str,
        method: &str,
        path: &str,
        upload_size_hint: Option<i64>,
    ) -> IamResult<()> {
        let roles = self.policy.roles_for_user(user_id).await?;
        let allowed = self.policy.is_allowed(app_id, &roles, method, path).await?;

        if !allowed {
            return Err(IamError::Denied {
                method: method.to_owned(),
                path: path.to_owned(),
            });
        }

        self.enforce_quota(app_id, user_id, upload_size_hint).await?;

        if !self.rate_limiter.try_acquire(user_id, route_class) {
            return Err(IamError::RateLimited);
        }

        Ok(())
    }

    /// Advisory pre-check of the caller's `(app_id, user_id)` quota
    /// against `size_hint`. Authoritative admission still happens inside
    /// the token service and storage service, which reserve and commit
    /// against the same quota row under CAS.
    async fn enforce_quota(&self, app_id: &str, user_id: &str, size_hint: Option<i64>) -> IamResult<()> {
        let Some(size_hint) = size_hint else { return Ok(()) };

        let quota = self.user_quotas.get_or_create(app_id, user_id).await?;
        let Some(limit) = quota.quota_bytes else { return Ok(()) };

        let reserved = self.user_quotas.reserved_total(app_id, user_id).await?;
        let available = (limit - quota.used_bytes - reserved).max(0);

        if size_hint > available {
            return Err(IamError::QuotaExceeded { requested: size_hint, available });
        }

        Ok(())
    }

    /// Resolve the role names held by a user, without evaluating any
    /// policy. Used by the login handler, which must know a user's roles
    /// before it can issue a token carrying them.
    pub async fn roles_for_user(&self, user_id: &str) -> IamResult<Vec<String>> {
        self.policy.roles_for_user(user_id).await
    }
}
