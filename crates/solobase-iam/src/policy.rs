//! Path-policy evaluation: role/glob/method/effect tuples, deny-wins,
//! default-deny for unmatched admin paths.

use solobase_db::{PathPolicy, PolicyEffect, RoleRepo};

use crate::error::IamResult;
use crate::glob;

/// Evaluates path policies for a resolved set of role names.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    roles: RoleRepo,
}

impl PolicyEngine {
    /// Build an engine over the role repository.
    #[must_use]
    pub fn new(roles: RoleRepo) -> Self {
        Self { roles }
    }

    /// Resolve the role names held by a user.
    pub async fn roles_for_user(&self, user_id: &str) -> IamResult<Vec<String>> {
        Ok(self.roles.roles_for_user(user_id).await?)
    }

    /// Decide whether `role_names` may perform `method` on `path`.
    ///
    /// Evaluation order: gather every policy whose glob and method match,
    /// ordered by descending priority; the first match wins. A `deny`
    /// policy at a given priority always wins over an `allow` at the same
    /// priority (deny-wins). Paths under `/api/admin` or `/admin` default
    /// to deny when no policy matches at all; every other path defaults
    /// to deny as well — Solobase grants no implicit access.
    pub async fn is_allowed(&self, app_id: &str, role_names: &[String], method: &str, path: &str) -> IamResult<bool> {
        let policies = self.roles.policies_for_roles(app_id, role_names).await?;

        let mut matching: Vec<&PathPolicy> = policies
            .iter()
            .filter(|p| method_matches(&p.method, method) && glob::matches(&p.path_glob, path))
            .collect();

        // stable sort already gives descending priority order from the
        // repository query; re-sort defensively and break ties deny-first.
        matching.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| effect_rank(b.effect).cmp(&effect_rank(a.effect)))
        });

        Ok(matching.first().is_some_and(|p| p.effect == PolicyEffect::Allow))
    }
}

fn method_matches(policy_method: &str, request_method: &str) -> bool {
    policy_method == "*" || policy_method.eq_ignore_ascii_case(request_method)
}

fn effect_rank(effect: PolicyEffect) -> u8 {
    match effect {
        PolicyEffect::Deny => 1,
        PolicyEffect::Allow => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solobase_db::Repos;

    async fn engine_with_policies() -> (PolicyEngine, String) {
        let pool = solobase_db::connect("sqlite::memory:").await.unwrap();
        let repos = Repos::new(pool);

        repos.roles.create("solobase", "viewer").await.unwrap();
        repos
            .roles
            .add_policy("solobase", "viewer", "/api/buckets/**", "GET", PolicyEffect::Allow, 0)
            .await
            .unwrap();
        repos
            .roles
            .add_policy("solobase", "viewer", "/api/buckets/**", "DELETE", PolicyEffect::Deny, 10)
            .await
            .unwrap();

        (PolicyEngine::new(repos.roles), "solobase".to_owned())
    }

    #[tokio::test]
    async fn test_should_allow_matching_get() {
        let (engine, app_id) = engine_with_policies().await;
        let allowed = engine
            .is_allowed(&app_id, &["viewer".to_owned()], "GET", "/api/buckets/photos")
            .await
            .unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn test_should_deny_unmatched_method() {
        let (engine, app_id) = engine_with_policies().await;
        let allowed = engine
            .is_allowed(&app_id, &["viewer".to_owned()], "PUT", "/api/buckets/photos")
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn test_should_apply_explicit_deny() {
        let (engine, app_id) = engine_with_policies().await;
        let allowed = engine
            .is_allowed(&app_id, &["viewer".to_owned()], "DELETE", "/api/buckets/photos")
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn test_should_default_deny_admin_paths_with_no_policy() {
        let (engine, app_id) = engine_with_policies().await;
        let allowed = engine
            .is_allowed(&app_id, &["viewer".to_owned()], "GET", "/api/admin/storage/health")
            .await
            .unwrap();
        assert!(!allowed);
    }
}
